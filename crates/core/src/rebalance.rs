//! Flash-loan sizing and dispatch.
//!
//! Rebalancing is a closed-form single step: with collateral `C`, debt `D`,
//! float `f` and target `t`, a loan of `|t(C + f) - D| / (1 - t)` run through
//! the callback lands the position on `t` without iterating.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accounting::Position;
use crate::error::{ConfigError, StrategyError, StrategyResult};
use crate::events::StrategyEvent;
use crate::flash::{FlashCallback, FlashLoanIntent};
use crate::market::{Environment, Markets};
use crate::strategy::Strategy;
use crate::wad::{self, WAD};

/// A flash loan ready to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub flash_loan_amount: U256,
    pub intent: FlashLoanIntent,
}

/// Size the flash loan that moves `position` to `target_ltv`.
///
/// Returns `None` when there is neither a loan nor float to move.
pub fn plan_rebalance(position: &Position, target_ltv: U256) -> StrategyResult<Option<RebalancePlan>> {
    if target_ltv >= WAD {
        return Err(ConfigError::FractionOutOfRange {
            field: "target_ltv",
            value: target_ltv,
        }
        .into());
    }

    let gross = wad::add(position.float, position.collateral)?;
    let target = wad::mul_wad_down(target_ltv, gross)?;
    let is_deposit = target > position.debt;
    let delta = if is_deposit {
        target - position.debt
    } else {
        position.debt - target
    };
    let flash_loan_amount = wad::div_wad_down(delta, WAD - target_ltv)?;

    if flash_loan_amount.is_zero() && position.float.is_zero() {
        return Ok(None);
    }

    // Float with nothing to repay can only be supplied
    let intent = if is_deposit || position.debt.is_zero() {
        FlashLoanIntent::Deposit {
            amount: position.float,
        }
    } else {
        FlashLoanIntent::Deleverage {
            amount: position.float,
        }
    };
    Ok(Some(RebalancePlan {
        flash_loan_amount,
        intent,
    }))
}

/// Size the flash loan that frees `amount` of equity at an unchanged LTV.
pub fn plan_withdraw(amount: U256, position: &Position) -> StrategyResult<RebalancePlan> {
    if amount.is_zero() {
        return Err(StrategyError::RoundingShortfall("withdrawal amount is zero"));
    }
    let equity = position.net_collateral()?;
    let flash_loan_amount = wad::mul_div_down(amount, position.debt, equity)?;
    Ok(RebalancePlan {
        flash_loan_amount,
        intent: FlashLoanIntent::Withdraw { amount },
    })
}

impl Strategy {
    /// Commit the float and move the position to the current target.
    pub(crate) fn rebalance_position<E: Environment>(
        &mut self,
        env: &mut E,
    ) -> StrategyResult<Option<RebalancePlan>> {
        let position = self.position(env.view())?;
        let plan = plan_rebalance(&position, self.state.target_ltv)?;

        self.state.total_invested = wad::add(self.state.total_invested, position.float)?;

        let Some(plan) = plan else {
            return Ok(None);
        };
        self.dispatch(env.markets(), plan)?;

        info!(
            intent = plan.intent.label(),
            flash_loan = %plan.flash_loan_amount,
            float = %position.float,
            target_ltv = wad::wad_to_f64(self.state.target_ltv),
            "Position rebalanced"
        );
        self.events.push(StrategyEvent::Rebalanced {
            flash_loan_amount: plan.flash_loan_amount,
            intent: plan.intent,
        });
        Ok(Some(plan))
    }

    /// Unwind `amount` of equity into the float.
    pub(crate) fn withdraw_position<E: Environment>(
        &mut self,
        env: &mut E,
        amount: U256,
    ) -> StrategyResult<RebalancePlan> {
        let position = self.position(env.view())?;
        let plan = plan_withdraw(amount, &position)?;
        self.dispatch(env.markets(), plan)?;

        info!(
            amount = %amount,
            flash_loan = %plan.flash_loan_amount,
            "Withdrawn to vault"
        );
        self.events.push(StrategyEvent::WithdrawnToVault {
            amount,
            flash_loan_amount: plan.flash_loan_amount,
        });
        Ok(plan)
    }

    /// Take the flash loan and run the callback against this strategy.
    fn dispatch(&mut self, markets: Markets<'_>, plan: RebalancePlan) -> StrategyResult<()> {
        let Markets {
            oracle,
            staking,
            lending,
            exchange,
            flash,
            ..
        } = markets;
        let asset = self.setup.base_asset;
        let mut callback = FlashCallback {
            setup: &self.setup,
            state: &mut self.state,
            oracle,
            staking,
            lending,
            exchange,
        };
        flash.flash_loan(&mut callback, asset, plan.flash_loan_amount, plan.intent)
    }
}
