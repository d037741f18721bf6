//! Interfaces of the external services the strategy drives.
//!
//! The strategy never implements a lending market, staking protocol, price
//! feed, exchange pool or flash-loan provider itself; it calls out to them
//! through these traits. Amounts are raw token units (18 decimals), fractions
//! are WAD.

use alloy::primitives::{Address, U256};
use std::fmt::Debug;

use crate::error::{StrategyError, StrategyResult};
use crate::flash::{FlashLoan, FlashLoanIntent};
use crate::wad;

/// Answer of a price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceData {
    /// Base asset per derivative, in `decimals` decimals
    pub price: U256,
    /// Price decimals
    pub decimals: u8,
    /// Timestamp when the answer was updated
    pub updated_at: u64,
}

impl PriceData {
    /// Price as a WAD (base per derivative).
    pub fn normalized(&self) -> StrategyResult<U256> {
        if self.price.is_zero() {
            return Err(StrategyError::Oracle("price feed returned zero".into()));
        }
        Ok(wad::normalize_to_wad(self.price, self.decimals)?)
    }

    /// Check if the answer is older than `threshold_secs`.
    ///
    /// The engine itself never rejects stale answers; this is for monitors.
    pub fn is_stale(&self, threshold_secs: u64, current_time: u64) -> bool {
        current_time.saturating_sub(self.updated_at) > threshold_secs
    }
}

/// Price feed quoting the staking derivative in base-asset units.
pub trait PriceOracle: Debug {
    /// Feed address.
    fn address(&self) -> Address;

    /// Latest answer.
    fn latest_price(&self) -> StrategyResult<PriceData>;
}

/// Read-only exchange rate between the derivative and its wrapped form.
pub trait WrapRate: Debug {
    /// Derivative units per one wrapped unit (WAD).
    fn derivative_per_wrapped(&self) -> StrategyResult<U256>;

    /// Wrapped units per one derivative unit (WAD).
    fn wrapped_per_derivative(&self) -> StrategyResult<U256>;
}

/// Liquid-staking protocol with a wrapper token.
pub trait StakingProtocol: WrapRate {
    /// Stake base asset, returning derivative units received.
    fn stake(&mut self, amount: U256) -> StrategyResult<U256>;

    /// Wrap derivative units, returning wrapped units received.
    fn wrap(&mut self, derivative: U256) -> StrategyResult<U256>;

    /// Unwrap wrapped units, returning derivative units received.
    fn unwrap(&mut self, wrapped: U256) -> StrategyResult<U256>;
}

/// Interest rate mode for borrow/repay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RateMode {
    Stable = 1,
    #[default]
    Variable = 2,
}

/// Lending market holding the strategy's collateral and debt.
pub trait LendingMarket: Debug {
    /// Supply `amount` of `asset` as collateral on behalf of `account`.
    fn supply(&mut self, account: Address, asset: Address, amount: U256) -> StrategyResult<()>;

    /// Borrow `amount` of `asset` against `account`'s collateral.
    fn borrow(
        &mut self,
        account: Address,
        asset: Address,
        amount: U256,
        mode: RateMode,
    ) -> StrategyResult<()>;

    /// Repay up to `amount` of debt. Returns the amount actually repaid.
    fn repay(
        &mut self,
        account: Address,
        asset: Address,
        amount: U256,
        mode: RateMode,
    ) -> StrategyResult<U256>;

    /// Withdraw collateral; `U256::MAX` withdraws everything.
    /// Returns the amount actually withdrawn.
    fn withdraw(&mut self, account: Address, asset: Address, amount: U256) -> StrategyResult<U256>;

    /// Maximum LTV of a risk category, as a WAD fraction.
    fn max_ltv(&self, category: u8) -> StrategyResult<U256>;

    /// Collateral balance of `account`, in wrapped units.
    fn collateral_balance(&self, account: Address) -> StrategyResult<U256>;

    /// Debt balance of `account`, in base units.
    fn debt_balance(&self, account: Address) -> StrategyResult<U256>;
}

/// Market-making pool between the derivative and the base asset.
pub trait ExchangePool: Debug {
    /// Pool address.
    fn address(&self) -> Address;

    /// Exchange `amount` of `from` into `to`. Must fail if the output would be
    /// below `min_out`.
    fn exchange(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
        min_out: U256,
    ) -> StrategyResult<U256>;
}

/// Receiver side of a flash loan.
pub trait FlashLoanReceiver {
    /// Called by the provider after the loan has been transferred.
    /// Returns the amount handed back, which must cover principal plus fee.
    fn receive_flash_loan(
        &mut self,
        caller: Address,
        loan: &FlashLoan,
        intent: FlashLoanIntent,
    ) -> StrategyResult<U256>;
}

/// Single-callback flash-loan provider.
pub trait FlashLoanProvider: Debug {
    /// Provider address, passed as `caller` to the receiver.
    fn address(&self) -> Address;

    /// Lend `amount` of `asset` to `receiver` for the duration of the callback.
    fn flash_loan(
        &mut self,
        receiver: &mut dyn FlashLoanReceiver,
        asset: Address,
        amount: U256,
        intent: FlashLoanIntent,
    ) -> StrategyResult<()>;
}

/// Share-accounting vault wrapping the strategy.
pub trait VaultShell: Debug {
    /// Mint a performance-fee claim worth `assets` at the current share price.
    /// Returns the shares minted.
    fn mint_performance_fee(&mut self, assets: U256) -> StrategyResult<U256>;
}

/// Mutable handles to every collaborator, borrowed for one operation.
pub struct Markets<'a> {
    pub oracle: &'a dyn PriceOracle,
    pub staking: &'a mut dyn StakingProtocol,
    pub lending: &'a mut dyn LendingMarket,
    pub exchange: &'a mut dyn ExchangePool,
    pub flash: &'a mut dyn FlashLoanProvider,
    pub vault: &'a mut dyn VaultShell,
}

/// Read-only handles for accounting queries.
#[derive(Clone, Copy)]
pub struct MarketView<'a> {
    pub oracle: &'a dyn PriceOracle,
    pub rates: &'a dyn WrapRate,
    pub lending: &'a dyn LendingMarket,
}

/// The world a strategy operates in.
///
/// `Clone` lets [`crate::Strategy`] run an operation against a scratch copy
/// and keep it only on success, which is how the all-or-nothing transaction
/// semantics are reproduced off-chain.
pub trait Environment: Clone {
    fn markets(&mut self) -> Markets<'_>;

    fn view(&self) -> MarketView<'_>;
}
