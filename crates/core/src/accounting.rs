//! Read-only position accounting.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{ArithmeticError, ConfigError, StrategyResult};
use crate::market::{LendingMarket, PriceOracle, WrapRate};
use crate::units::UnitConverter;
use crate::wad::{self, WAD};

/// Strategy position in base-asset units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Collateral value (wrapped collateral converted to base)
    pub collateral: U256,
    /// Outstanding debt
    pub debt: U256,
    /// Idle base asset
    pub float: U256,
}

impl Position {
    /// Value raw balances.
    pub fn from_balances<O, R>(
        collateral_wrapped: U256,
        debt: U256,
        float: U256,
        converter: &UnitConverter<'_, O, R>,
    ) -> StrategyResult<Self>
    where
        O: PriceOracle + ?Sized,
        R: WrapRate + ?Sized,
    {
        Ok(Self {
            collateral: converter.wrapped_to_base(collateral_wrapped)?,
            debt,
            float,
        })
    }

    /// Read balances of `account` from the market and value them.
    pub fn read<O, R>(
        lending: &dyn LendingMarket,
        account: Address,
        float: U256,
        converter: &UnitConverter<'_, O, R>,
    ) -> StrategyResult<Self>
    where
        O: PriceOracle + ?Sized,
        R: WrapRate + ?Sized,
    {
        let collateral_wrapped = lending.collateral_balance(account)?;
        let debt = lending.debt_balance(account)?;
        Self::from_balances(collateral_wrapped, debt, float, converter)
    }

    /// `collateral - debt + float`. Fails instead of going negative.
    pub fn total_assets(&self) -> StrategyResult<U256> {
        let gross = wad::add(self.collateral, self.float)?;
        if self.debt > gross {
            return Err(ArithmeticError::Insolvent {
                collateral: self.collateral,
                debt: self.debt,
                float: self.float,
            }
            .into());
        }
        Ok(gross - self.debt)
    }

    /// Net equity locked in the lending market.
    pub fn net_collateral(&self) -> StrategyResult<U256> {
        if self.collateral <= self.debt {
            return Err(ArithmeticError::ZeroEquity {
                collateral: self.collateral,
                debt: self.debt,
            }
            .into());
        }
        Ok(self.collateral - self.debt)
    }

    /// `collateral / (collateral - debt)` as a WAD, rounded up. Zero without collateral.
    pub fn leverage(&self) -> StrategyResult<U256> {
        if self.collateral.is_zero() {
            return Ok(U256::ZERO);
        }
        let equity = self.net_collateral()?;
        Ok(wad::div_wad_up(self.collateral, equity)?)
    }

    /// `debt / collateral` as a WAD, rounded up. Zero without collateral.
    pub fn ltv(&self) -> StrategyResult<U256> {
        if self.collateral.is_zero() {
            return Ok(U256::ZERO);
        }
        Ok(wad::div_wad_up(self.debt, self.collateral)?)
    }
}

/// Max LTV of the configured risk category, checked to be a fraction.
pub fn max_ltv(lending: &dyn LendingMarket, category: u8) -> StrategyResult<U256> {
    let value = lending.max_ltv(category)?;
    if value > WAD {
        return Err(ConfigError::FractionOutOfRange {
            field: "max_ltv",
            value,
        }
        .into());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;
    use crate::testing::{eth, MockLending, MockOracle, MockStaking, STRATEGY};
    use crate::wad::from_bps;

    fn position(collateral: u64, debt: u64, float: u64) -> Position {
        Position {
            collateral: eth(collateral),
            debt: eth(debt),
            float: eth(float),
        }
    }

    #[test]
    fn test_total_assets() {
        assert_eq!(position(100, 70, 5).total_assets().unwrap(), eth(35));
        assert_eq!(position(0, 0, 5).total_assets().unwrap(), eth(5));
        // Debt above collateral but covered by float
        assert_eq!(position(60, 70, 15).total_assets().unwrap(), eth(5));
    }

    #[test]
    fn test_total_assets_insolvent() {
        let err = position(60, 70, 5).total_assets().unwrap_err();
        assert!(matches!(
            err,
            StrategyError::Arithmetic(ArithmeticError::Insolvent { .. })
        ));
    }

    #[test]
    fn test_leverage_and_ltv() {
        let pos = position(100, 70, 0);
        assert_eq!(pos.ltv().unwrap(), from_bps(7000));
        // 100 / 30 = 3.333.. rounded up
        assert_eq!(
            pos.leverage().unwrap(),
            U256::from(3_333_333_333_333_333_334u128)
        );

        let empty = Position::default();
        assert_eq!(empty.ltv().unwrap(), U256::ZERO);
        assert_eq!(empty.leverage().unwrap(), U256::ZERO);
    }

    #[test]
    fn test_leverage_zero_equity() {
        let err = position(70, 70, 0).leverage().unwrap_err();
        assert!(matches!(
            err,
            StrategyError::Arithmetic(ArithmeticError::ZeroEquity { .. })
        ));
    }

    #[test]
    fn test_read_values_collateral() {
        let oracle = MockOracle::new(WAD);
        let staking = MockStaking::new(from_bps(11000));
        let mut lending = MockLending::new(from_bps(9000));
        lending.set_position(STRATEGY, eth(10), eth(5));
        let conv = UnitConverter::new(&oracle, &staking);

        let pos = Position::read(&lending, STRATEGY, eth(1), &conv).unwrap();
        assert_eq!(pos.collateral, eth(11));
        assert_eq!(pos.debt, eth(5));
        assert_eq!(pos.total_assets().unwrap(), eth(7));
    }

    #[test]
    fn test_max_ltv_must_be_fraction() {
        let lending = MockLending::new(from_bps(9000));
        assert_eq!(max_ltv(&lending, 1).unwrap(), from_bps(9000));

        let broken = MockLending::new(WAD + U256::from(1u8));
        assert!(max_ltv(&broken, 1).is_err());
    }
}
