//! Conversions between the base asset, the staking derivative and the
//! wrapped derivative.
//!
//! Rates are read from the price feed and the wrapper on every call and never
//! cached. Conversions that value what the strategy owns round down; the
//! `_up` variant exists only for sizing withdrawals that must cover an
//! obligation.

use alloy::primitives::U256;

use crate::error::StrategyResult;
use crate::market::{PriceOracle, WrapRate};
use crate::wad;

/// Live conversion rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRate {
    /// Base asset per derivative (WAD)
    pub price: U256,
    /// Derivative per wrapped (WAD)
    pub derivative_per_wrapped: U256,
    /// Wrapped per derivative (WAD), the wrapper's own inverse
    pub wrapped_per_derivative: U256,
}

/// Unit converter over a price feed and a wrap-rate source.
#[derive(Debug)]
pub struct UnitConverter<'a, O: PriceOracle + ?Sized, R: WrapRate + ?Sized> {
    oracle: &'a O,
    rates: &'a R,
}

impl<'a, O: PriceOracle + ?Sized, R: WrapRate + ?Sized> UnitConverter<'a, O, R> {
    pub fn new(oracle: &'a O, rates: &'a R) -> Self {
        Self { oracle, rates }
    }

    /// Read the price and both wrap rates.
    pub fn rates(&self) -> StrategyResult<ConversionRate> {
        Ok(ConversionRate {
            price: self.price()?,
            derivative_per_wrapped: self.rates.derivative_per_wrapped()?,
            wrapped_per_derivative: self.rates.wrapped_per_derivative()?,
        })
    }

    fn price(&self) -> StrategyResult<U256> {
        self.oracle.latest_price()?.normalized()
    }

    /// Derivative → base, rounded down.
    pub fn derivative_to_base(&self, amount: U256) -> StrategyResult<U256> {
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        Ok(wad::mul_wad_down(amount, self.price()?)?)
    }

    /// Base → derivative, rounded down.
    pub fn base_to_derivative(&self, amount: U256) -> StrategyResult<U256> {
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        Ok(wad::div_wad_down(amount, self.price()?)?)
    }

    /// Wrapped → base, rounded down at both steps.
    pub fn wrapped_to_base(&self, amount: U256) -> StrategyResult<U256> {
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        let rate = self.rates()?;
        let derivative = wad::mul_wad_down(amount, rate.derivative_per_wrapped)?;
        Ok(wad::mul_wad_down(derivative, rate.price)?)
    }

    /// Base → wrapped through the wrapper's inverse rate, rounded down at
    /// both steps.
    pub fn base_to_wrapped(&self, amount: U256) -> StrategyResult<U256> {
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        let rate = self.rates()?;
        let derivative = wad::div_wad_down(amount, rate.price)?;
        Ok(wad::mul_wad_down(derivative, rate.wrapped_per_derivative)?)
    }

    /// Base → wrapped, rounded up at both steps.
    ///
    /// Uses the forward rate so the result always covers `amount`.
    pub fn base_to_wrapped_up(&self, amount: U256) -> StrategyResult<U256> {
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        let rate = self.rates()?;
        let derivative = wad::div_wad_up(amount, rate.price)?;
        Ok(wad::div_wad_up(derivative, rate.derivative_per_wrapped)?)
    }
}
