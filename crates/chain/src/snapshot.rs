//! Point-in-time market data and the position report derived from it.

use alloy::primitives::{Address, U256};

use lst_leverage_core::wad::{self, WAD};
use lst_leverage_core::{
    plan_rebalance, ConfigError, Position, PriceData, PriceOracle, RebalancePlan, StrategyResult,
    UnitConverter, WrapRate,
};

/// Everything the engine needs to value the position, read at one block.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub block_number: u64,
    pub price_feed: Address,
    pub price: PriceData,
    /// stETH per wstETH (WAD)
    pub derivative_per_wrapped: U256,
    /// wstETH per stETH (WAD)
    pub wrapped_per_derivative: U256,
    /// Collateral in wrapped units
    pub collateral_wrapped: U256,
    pub debt: U256,
    /// Idle base asset held by the strategy account
    pub float: U256,
    /// E-mode max LTV (WAD)
    pub max_ltv: U256,
}

impl PriceOracle for MarketSnapshot {
    fn address(&self) -> Address {
        self.price_feed
    }

    fn latest_price(&self) -> StrategyResult<PriceData> {
        Ok(self.price)
    }
}

impl WrapRate for MarketSnapshot {
    fn derivative_per_wrapped(&self) -> StrategyResult<U256> {
        Ok(self.derivative_per_wrapped)
    }

    fn wrapped_per_derivative(&self) -> StrategyResult<U256> {
        Ok(self.wrapped_per_derivative)
    }
}

impl MarketSnapshot {
    pub fn converter(&self) -> UnitConverter<'_, Self, Self> {
        UnitConverter::new(self, self)
    }

    /// Position valued in base units.
    pub fn position(&self) -> StrategyResult<Position> {
        Position::from_balances(self.collateral_wrapped, self.debt, self.float, &self.converter())
    }

    /// Value the position and size the rebalance toward `target_ltv`.
    ///
    /// An underwater position still reports its LTV; equity-based fields
    /// are `None` then.
    pub fn report(&self, target_ltv: U256) -> StrategyResult<PositionReport> {
        if self.max_ltv > WAD {
            return Err(ConfigError::FractionOutOfRange {
                field: "max_ltv",
                value: self.max_ltv,
            }
            .into());
        }
        let position = self.position()?;
        Ok(PositionReport {
            block_number: self.block_number,
            total_assets: position.total_assets().ok(),
            leverage: position.leverage().ok(),
            ltv: position.ltv()?,
            target_ltv,
            max_ltv: self.max_ltv,
            plan: plan_rebalance(&position, target_ltv)?,
            position,
        })
    }
}

/// Health of the position at one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionReport {
    pub block_number: u64,
    pub position: Position,
    /// `None` once debt exceeds collateral plus float
    pub total_assets: Option<U256>,
    /// `None` once debt reaches collateral
    pub leverage: Option<U256>,
    pub ltv: U256,
    pub target_ltv: U256,
    pub max_ltv: U256,
    /// Flash loan a rebalance would dispatch right now
    pub plan: Option<RebalancePlan>,
}

impl PositionReport {
    /// `|ltv - target|`.
    pub fn ltv_drift(&self) -> U256 {
        if self.ltv > self.target_ltv {
            self.ltv - self.target_ltv
        } else {
            self.target_ltv - self.ltv
        }
    }

    /// `max_ltv - ltv`, zero once the position is past max.
    pub fn max_ltv_headroom(&self) -> U256 {
        self.max_ltv.saturating_sub(self.ltv)
    }

    pub fn drift_exceeds(&self, threshold: f64) -> bool {
        self.ltv_drift() > wad::f64_to_wad(threshold)
    }

    pub fn near_max_ltv(&self, margin: f64) -> bool {
        self.max_ltv_headroom() < wad::f64_to_wad(margin)
    }

    /// Debt at or above collateral value.
    pub fn is_underwater(&self) -> bool {
        !self.position.debt.is_zero() && self.position.debt >= self.position.collateral
    }
}
