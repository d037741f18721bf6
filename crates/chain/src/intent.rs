//! Flash-loan user data codec.
//!
//! The intent travels through the Balancer vault as `abi.encode(uint8 action,
//! uint256 amount)` and comes back in `receiveFlashLoan`.

use alloy::primitives::{Address, Bytes};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};
use anyhow::{bail, ensure, Context, Result};

use lst_leverage_core::{FlashLoan, FlashLoanIntent, RebalancePlan};

use crate::contracts::{IBalancerVault, IFlashLoanRecipient};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct FlashLoanUserData {
        uint8 action;
        uint256 amount;
    }
}

const ACTION_DEPOSIT: u8 = 0;
const ACTION_WITHDRAW: u8 = 1;
const ACTION_DELEVERAGE: u8 = 2;

/// Encode an intent as flash-loan user data.
pub fn encode_intent(intent: &FlashLoanIntent) -> Bytes {
    let action = match intent {
        FlashLoanIntent::Deposit { .. } => ACTION_DEPOSIT,
        FlashLoanIntent::Withdraw { .. } => ACTION_WITHDRAW,
        FlashLoanIntent::Deleverage { .. } => ACTION_DELEVERAGE,
    };
    let data = FlashLoanUserData {
        action,
        amount: intent.amount(),
    };
    SolValue::abi_encode(&data).into()
}

/// Decode flash-loan user data back into an intent.
pub fn decode_intent(data: &[u8]) -> Result<FlashLoanIntent> {
    let decoded = <FlashLoanUserData as SolValue>::abi_decode(data, true)
        .context("malformed flash loan user data")?;
    let amount = decoded.amount;
    Ok(match decoded.action {
        ACTION_DEPOSIT => FlashLoanIntent::Deposit { amount },
        ACTION_WITHDRAW => FlashLoanIntent::Withdraw { amount },
        ACTION_DELEVERAGE => FlashLoanIntent::Deleverage { amount },
        other => bail!("unknown flash loan action {other}"),
    })
}

/// Calldata for `IBalancerVault.flashLoan` executing `plan` for `recipient`.
pub fn flash_loan_calldata(recipient: Address, asset: Address, plan: &RebalancePlan) -> Bytes {
    let call = IBalancerVault::flashLoanCall {
        recipient,
        tokens: vec![asset],
        amounts: vec![plan.flash_loan_amount],
        userData: encode_intent(&plan.intent),
    };
    SolCall::abi_encode(&call).into()
}

/// Decode the vault's `receiveFlashLoan` callback into loan terms and intent.
///
/// The strategy only ever borrows a single asset.
pub fn decode_flash_callback(calldata: &[u8]) -> Result<(FlashLoan, FlashLoanIntent)> {
    let call =
        <IFlashLoanRecipient::receiveFlashLoanCall as SolCall>::abi_decode(calldata, true)
            .context("malformed receiveFlashLoan calldata")?;
    ensure!(
        call.tokens.len() == 1 && call.amounts.len() == 1 && call.feeAmounts.len() == 1,
        "expected a single-asset flash loan, got {} tokens",
        call.tokens.len()
    );
    let loan = FlashLoan {
        asset: call.tokens[0],
        amount: call.amounts[0],
        fee: call.feeAmounts[0],
    };
    let intent = decode_intent(&call.userData)?;
    Ok((loan, intent))
}
