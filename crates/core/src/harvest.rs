//! Profit accrual.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::StrategyResult;
use crate::events::StrategyEvent;
use crate::market::Environment;
use crate::rebalance::RebalancePlan;
use crate::strategy::Strategy;
use crate::wad;

/// Outcome of a harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestReport {
    /// `total_invested` before the harvest
    pub previous_invested: U256,
    /// `total_invested` once the float was committed
    pub baseline: U256,
    /// Total assets after rebalancing; the new `total_invested`
    pub total_assets: U256,
    pub profit: U256,
    pub fee: U256,
    pub fee_shares: U256,
    pub rebalance: Option<RebalancePlan>,
}

impl Strategy {
    /// Rebalance, checkpoint the strategy value and charge the performance
    /// fee on any gain since the last checkpoint.
    #[instrument(skip_all, fields(account = %self.setup.account))]
    pub fn harvest<E: Environment>(&mut self, env: &mut E) -> StrategyResult<HarvestReport> {
        self.transact(env, |strategy, env| strategy.harvest_position(env))
    }

    fn harvest_position<E: Environment>(&mut self, env: &mut E) -> StrategyResult<HarvestReport> {
        let previous_invested = self.state.total_invested;
        let rebalance = self.rebalance_position(env)?;
        let baseline = self.state.total_invested;

        let total_assets = self.total_assets(env.view())?;
        self.state.total_invested = total_assets;

        let mut report = HarvestReport {
            previous_invested,
            baseline,
            total_assets,
            profit: U256::ZERO,
            fee: U256::ZERO,
            fee_shares: U256::ZERO,
            rebalance,
        };

        if total_assets <= baseline {
            debug!(
                total_assets = %total_assets,
                baseline = %baseline,
                "No profit to harvest"
            );
            return Ok(report);
        }

        let profit = total_assets - baseline;
        self.state.total_profit = wad::add(self.state.total_profit, profit)?;
        let fee = wad::mul_wad_down(profit, self.state.performance_fee)?;
        let fee_shares = if fee.is_zero() {
            U256::ZERO
        } else {
            env.markets().vault.mint_performance_fee(fee)?
        };

        report.profit = profit;
        report.fee = fee;
        report.fee_shares = fee_shares;

        info!(
            profit = %profit,
            fee = %fee,
            fee_shares = %fee_shares,
            total_assets = %total_assets,
            "Harvested"
        );
        self.events.push(StrategyEvent::Harvest {
            profit,
            fee,
            fee_shares,
        });
        Ok(report)
    }
}
