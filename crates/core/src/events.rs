//! Events recorded by strategy operations.
//!
//! Events are appended inside the operation's transaction, so a reverted
//! operation leaves none behind.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::flash::FlashLoanIntent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StrategyEvent {
    Rebalanced {
        flash_loan_amount: U256,
        intent: FlashLoanIntent,
    },
    WithdrawnToVault {
        amount: U256,
        flash_loan_amount: U256,
    },
    Harvest {
        profit: U256,
        fee: U256,
        fee_shares: U256,
    },
    LeverageChanged {
        old: U256,
        new: U256,
    },
    SlippageToleranceUpdated {
        old: U256,
        new: U256,
    },
    PerformanceFeeUpdated {
        old: U256,
        new: U256,
    },
    ExchangeUpdated {
        old: Address,
        new: Address,
    },
    PriceFeedUpdated {
        old: Address,
        new: Address,
    },
}
