//! Leveraged liquid-staking strategy core.
//!
//! This crate provides the position-management engine:
//! - Unit conversion between the base asset, staking derivative and wrapped derivative
//! - Position accounting (total assets, leverage, LTV, max LTV)
//! - Closed-form flash-loan sizing for rebalances and partial unwinds
//! - The flash-loan callback that levers up or unwinds in one nested call
//! - Harvest with performance-fee accrual
//!
//! External services (lending market, staking protocol, price feed, exchange
//! pool, flash-loan provider, vault shell) are reached through the traits in
//! [`market`].

mod accounting;
pub mod config;
mod error;
mod events;
mod flash;
mod harvest;
pub mod market;
mod rebalance;
mod strategy;
pub mod units;
pub mod wad;

#[cfg(test)]
pub(crate) mod testing;

pub use accounting::{max_ltv, Position};
pub use config::{KeeperConfig, StrategyConfig};
pub use error::{ArithmeticError, ConfigError, ErrorKind, Holding, StrategyError, StrategyResult};
pub use events::StrategyEvent;
pub use flash::{FlashLoan, FlashLoanIntent};
pub use harvest::HarvestReport;
pub use market::{
    Environment, ExchangePool, FlashLoanProvider, FlashLoanReceiver, LendingMarket, MarketView,
    Markets, PriceData, PriceOracle, RateMode, StakingProtocol, VaultShell, WrapRate,
};
pub use rebalance::{plan_rebalance, plan_withdraw, RebalancePlan};
pub use strategy::{Holdings, Strategy, StrategyParams, StrategySetup, StrategyState};
pub use units::{ConversionRate, UnitConverter};
