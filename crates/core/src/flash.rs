//! Flash-loan intents and the callback body that executes them.
//!
//! The provider lends the base asset and calls back into
//! [`FlashCallback::receive_flash_loan`] before returning. Everything the
//! callback does happens inside that one nested call, and the callback must
//! hand back principal plus fee or the provider fails the loan.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Holding, StrategyError, StrategyResult};
use crate::market::{
    ExchangePool, FlashLoanReceiver, LendingMarket, PriceOracle, RateMode, StakingProtocol,
};
use crate::strategy::{StrategySetup, StrategyState};
use crate::units::UnitConverter;
use crate::wad;

/// What the callback should do with the borrowed funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlashLoanIntent {
    /// Lever up: stake the float plus the loan, borrow the loan back.
    Deposit { amount: U256 },
    /// Unwind enough of the position to free `amount` of base asset.
    Withdraw { amount: U256 },
    /// Lever down toward target, keeping the float of `amount` invested.
    Deleverage { amount: U256 },
}

impl FlashLoanIntent {
    /// Base-asset amount carried by the intent.
    pub fn amount(&self) -> U256 {
        match *self {
            Self::Deposit { amount } | Self::Withdraw { amount } | Self::Deleverage { amount } => {
                amount
            }
        }
    }

    pub fn is_deposit(&self) -> bool {
        matches!(self, Self::Deposit { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Deleverage { .. } => "deleverage",
        }
    }
}

/// Terms of an outstanding flash loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLoan {
    pub asset: Address,
    pub amount: U256,
    pub fee: U256,
}

impl FlashLoan {
    /// Principal plus fee.
    pub fn owed(&self) -> StrategyResult<U256> {
        Ok(wad::add(self.amount, self.fee)?)
    }
}

/// Receiver handed to the flash-loan provider for one loan.
///
/// Holds the strategy state mutably for the loan's lifetime, so a second
/// loan cannot start while this one is open.
pub(crate) struct FlashCallback<'a> {
    pub setup: &'a StrategySetup,
    pub state: &'a mut StrategyState,
    pub oracle: &'a dyn PriceOracle,
    pub staking: &'a mut dyn StakingProtocol,
    pub lending: &'a mut dyn LendingMarket,
    pub exchange: &'a mut dyn ExchangePool,
}

impl FlashLoanReceiver for FlashCallback<'_> {
    fn receive_flash_loan(
        &mut self,
        caller: Address,
        loan: &FlashLoan,
        intent: FlashLoanIntent,
    ) -> StrategyResult<U256> {
        if caller != self.setup.flash_loan_provider {
            return Err(StrategyError::InvalidFlashLoanCaller {
                caller,
                expected: self.setup.flash_loan_provider,
            });
        }
        if loan.asset != self.setup.base_asset {
            return Err(ConfigError::AddressMismatch {
                field: "flash loan asset",
                expected: self.setup.base_asset,
                actual: loan.asset,
            }
            .into());
        }

        self.state.holdings.credit(Holding::Base, loan.amount)?;
        let owed = loan.owed()?;

        debug!(
            intent = intent.label(),
            amount = %intent.amount(),
            loan = %loan.amount,
            fee = %loan.fee,
            "Flash loan received"
        );

        match intent {
            FlashLoanIntent::Deposit { amount } => self.lever_up(amount, loan.amount, owed)?,
            FlashLoanIntent::Withdraw { amount } => self.unwind(amount, loan.amount)?,
            FlashLoanIntent::Deleverage { .. } => self.lever_down(loan.amount, owed)?,
        }

        self.state.holdings.debit(Holding::Base, owed)?;
        Ok(owed)
    }
}

impl FlashCallback<'_> {
    /// Stake, wrap and supply the float plus the loan, then borrow what the
    /// provider is owed.
    fn lever_up(&mut self, float: U256, loan: U256, owed: U256) -> StrategyResult<()> {
        self.supply_base(wad::add(float, loan)?)?;

        if !owed.is_zero() {
            self.lending.borrow(
                self.setup.account,
                self.setup.base_asset,
                owed,
                RateMode::Variable,
            )?;
            self.state.holdings.credit(Holding::Base, owed)?;
        }
        Ok(())
    }

    /// Repay debt with the loan and sell collateral worth `amount + loan`.
    /// A loan covering the whole debt closes the position.
    fn unwind(&mut self, amount: U256, loan: U256) -> StrategyResult<()> {
        let debt = self.lending.debt_balance(self.setup.account)?;

        // Debt-free collateral is never closed out here: only `amount` is
        // withdrawn, even though a zero loan trivially covers zero debt.
        let withdrawn = if !debt.is_zero() && loan >= debt {
            self.repay_debt(debt)?;
            self.lending
                .withdraw(self.setup.account, self.setup.wrapped, U256::MAX)?
        } else {
            self.repay_debt(loan)?;
            let request = UnitConverter::new(self.oracle, &*self.staking)
                .base_to_wrapped(wad::add(amount, loan)?)?;
            if request.is_zero() {
                return Err(StrategyError::RoundingShortfall(
                    "withdrawal resolves to zero collateral",
                ));
            }
            self.lending
                .withdraw(self.setup.account, self.setup.wrapped, request)?
        };

        self.state.holdings.credit(Holding::Wrapped, withdrawn)?;
        self.sell_collateral(withdrawn)?;
        Ok(())
    }

    /// Repay the loan's worth of debt and settle the loan from the float,
    /// selling only as much collateral as the float cannot cover.
    fn lever_down(&mut self, loan: U256, owed: U256) -> StrategyResult<()> {
        let debt = self.lending.debt_balance(self.setup.account)?;
        self.repay_debt(loan.min(debt))?;

        let available = self.state.holdings.base;
        if available >= owed {
            let leftover = available - owed;
            // Dust that wraps to nothing stays in the float
            if UnitConverter::new(self.oracle, &*self.staking)
                .base_to_wrapped(leftover)?
                .is_zero()
            {
                return Ok(());
            }
            return self.supply_base(leftover);
        }

        let shortfall = owed - available;
        let tolerance = self.state.slippage_tolerance;
        let gross = if tolerance.is_zero() {
            shortfall
        } else {
            wad::div_wad_up(shortfall, tolerance)?
        };
        let request = UnitConverter::new(self.oracle, &*self.staking).base_to_wrapped_up(gross)?;
        let withdrawn = self
            .lending
            .withdraw(self.setup.account, self.setup.wrapped, request)?;
        self.state.holdings.credit(Holding::Wrapped, withdrawn)?;
        self.sell_collateral(withdrawn)?;

        let extra = self.state.holdings.base.saturating_sub(owed);
        if !extra.is_zero() {
            let debt = self.lending.debt_balance(self.setup.account)?;
            self.repay_debt(extra.min(debt))?;
        }
        Ok(())
    }

    /// Base → derivative → wrapped → collateral.
    fn supply_base(&mut self, amount: U256) -> StrategyResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let holdings = &mut self.state.holdings;

        holdings.debit(Holding::Base, amount)?;
        let derivative = self.staking.stake(amount)?;
        holdings.credit(Holding::Derivative, derivative)?;

        holdings.debit(Holding::Derivative, derivative)?;
        let wrapped = self.staking.wrap(derivative)?;
        if wrapped.is_zero() {
            return Err(StrategyError::RoundingShortfall(
                "supply resolves to zero collateral",
            ));
        }
        holdings.credit(Holding::Wrapped, wrapped)?;

        holdings.debit(Holding::Wrapped, wrapped)?;
        self.lending
            .supply(self.setup.account, self.setup.wrapped, wrapped)?;

        debug!(base = %amount, wrapped = %wrapped, "Supplied collateral");
        Ok(())
    }

    /// Repay up to `amount` of debt from the base balance.
    fn repay_debt(&mut self, amount: U256) -> StrategyResult<U256> {
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        self.state.holdings.debit(Holding::Base, amount)?;
        let repaid = self.lending.repay(
            self.setup.account,
            self.setup.base_asset,
            amount,
            RateMode::Variable,
        )?;
        if repaid < amount {
            self.state.holdings.credit(Holding::Base, amount - repaid)?;
        }
        Ok(repaid)
    }

    /// Wrapped → derivative → base through the exchange pool, bounded by the
    /// slippage tolerance against the oracle value.
    fn sell_collateral(&mut self, wrapped: U256) -> StrategyResult<U256> {
        if wrapped.is_zero() {
            return Ok(U256::ZERO);
        }
        if self.exchange.address() != self.setup.exchange {
            return Err(ConfigError::AddressMismatch {
                field: "exchange",
                expected: self.setup.exchange,
                actual: self.exchange.address(),
            }
            .into());
        }

        self.state.holdings.debit(Holding::Wrapped, wrapped)?;
        let derivative = self.staking.unwrap(wrapped)?;
        self.state.holdings.credit(Holding::Derivative, derivative)?;

        let fair = UnitConverter::new(self.oracle, &*self.staking).derivative_to_base(derivative)?;
        let min_out = wad::mul_wad_down(fair, self.state.slippage_tolerance)?;

        self.state.holdings.debit(Holding::Derivative, derivative)?;
        let out = self.exchange.exchange(
            self.setup.derivative,
            self.setup.base_asset,
            derivative,
            min_out,
        )?;
        if out < min_out {
            return Err(StrategyError::Slippage {
                quoted: out,
                min_out,
            });
        }
        self.state.holdings.credit(Holding::Base, out)?;

        debug!(
            wrapped = %wrapped,
            derivative = %derivative,
            received = %out,
            min_out = %min_out,
            "Sold collateral"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Holdings;
    use crate::testing::{eth, test_setup, MockExchange, MockLending, MockOracle, MockStaking};
    use crate::wad::{from_bps, WAD};

    struct Fixture {
        setup: StrategySetup,
        state: StrategyState,
        oracle: MockOracle,
        staking: MockStaking,
        lending: MockLending,
        exchange: MockExchange,
    }

    impl Fixture {
        fn new() -> Self {
            let setup = test_setup();
            Self {
                oracle: MockOracle::new(WAD),
                staking: MockStaking::new(WAD),
                lending: MockLending::new(from_bps(9000)),
                exchange: MockExchange::new(setup.exchange, WAD),
                state: StrategyState {
                    target_ltv: from_bps(7000),
                    slippage_tolerance: from_bps(9900),
                    performance_fee: from_bps(1000),
                    total_invested: U256::ZERO,
                    total_profit: U256::ZERO,
                    holdings: Holdings::default(),
                },
                setup,
            }
        }

        fn receive(
            &mut self,
            caller: Address,
            loan: FlashLoan,
            intent: FlashLoanIntent,
        ) -> StrategyResult<U256> {
            let mut callback = FlashCallback {
                setup: &self.setup,
                state: &mut self.state,
                oracle: &self.oracle,
                staking: &mut self.staking,
                lending: &mut self.lending,
                exchange: &mut self.exchange,
            };
            callback.receive_flash_loan(caller, &loan, intent)
        }

        fn loan(&self, amount: U256) -> FlashLoan {
            FlashLoan {
                asset: self.setup.base_asset,
                amount,
                fee: U256::ZERO,
            }
        }
    }

    #[test]
    fn test_rejects_foreign_caller() {
        let mut fx = Fixture::new();
        let loan = fx.loan(eth(1));
        let err = fx
            .receive(
                Address::repeat_byte(0xee),
                loan,
                FlashLoanIntent::Deposit { amount: U256::ZERO },
            )
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidFlashLoanCaller { .. }));
        assert_eq!(fx.state.holdings, Holdings::default());
    }

    #[test]
    fn test_deposit_branch_supplies_and_borrows() {
        let mut fx = Fixture::new();
        fx.state.holdings.base = eth(10);
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(20));

        let repaid = fx
            .receive(provider, loan, FlashLoanIntent::Deposit { amount: eth(10) })
            .unwrap();

        assert_eq!(repaid, eth(20));
        assert_eq!(fx.lending.collateral_of(fx.setup.account), eth(30));
        assert_eq!(fx.lending.debt_of(fx.setup.account), eth(20));
        assert_eq!(fx.state.holdings, Holdings::default());
    }

    #[test]
    fn test_deposit_branch_borrows_fee() {
        let mut fx = Fixture::new();
        let provider = fx.setup.flash_loan_provider;
        let mut loan = fx.loan(eth(10));
        loan.fee = eth(1);

        let repaid = fx
            .receive(provider, loan, FlashLoanIntent::Deposit { amount: U256::ZERO })
            .unwrap();
        assert_eq!(repaid, eth(11));
        assert_eq!(fx.lending.debt_of(fx.setup.account), eth(11));
    }

    #[test]
    fn test_withdraw_branch_partial_unwind() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.lending.set_position(account, eth(100), eth(70));
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(35));

        fx.receive(provider, loan, FlashLoanIntent::Withdraw { amount: eth(15) })
            .unwrap();

        assert_eq!(fx.lending.debt_of(account), eth(35));
        assert_eq!(fx.lending.collateral_of(account), eth(50));
        assert_eq!(fx.state.holdings.base, eth(15));
    }

    #[test]
    fn test_withdraw_branch_full_unwind() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.lending.set_position(account, eth(100), eth(70));
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(80));

        fx.receive(provider, loan, FlashLoanIntent::Withdraw { amount: eth(40) })
            .unwrap();

        assert_eq!(fx.lending.debt_of(account), U256::ZERO);
        assert_eq!(fx.lending.collateral_of(account), U256::ZERO);
        // 100 sold, 70 repaid to the market, 80 owed back after borrowing 80
        assert_eq!(fx.state.holdings.base, eth(30));
    }

    #[test]
    fn test_withdraw_branch_enforces_min_out() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.lending.set_position(account, eth(100), eth(70));
        fx.exchange.rate = from_bps(9800);
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(35));

        let err = fx
            .receive(provider, loan, FlashLoanIntent::Withdraw { amount: eth(15) })
            .unwrap_err();
        assert!(matches!(err, StrategyError::Slippage { .. }));
    }

    #[test]
    fn test_withdraw_rejects_foreign_exchange() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.lending.set_position(account, eth(100), eth(70));
        fx.exchange = MockExchange::new(Address::repeat_byte(0x99), WAD);
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(35));

        let err = fx
            .receive(provider, loan, FlashLoanIntent::Withdraw { amount: eth(15) })
            .unwrap_err();
        assert_eq!(err.code(), "CFG_ADDRESS_MISMATCH");
    }

    #[test]
    fn test_deleverage_covers_loan_from_float() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.lending.set_position(account, eth(100), eth(70));
        fx.state.holdings.base = eth(30);
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(20));

        fx.receive(provider, loan, FlashLoanIntent::Deleverage { amount: eth(30) })
            .unwrap();

        // 20 repaid, the 10 of float left over is supplied
        assert_eq!(fx.lending.debt_of(account), eth(50));
        assert_eq!(fx.lending.collateral_of(account), eth(110));
        assert_eq!(fx.state.holdings.base, U256::ZERO);
    }

    #[test]
    fn test_deleverage_sells_collateral_for_shortfall() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.lending.set_position(account, eth(100), eth(70));
        fx.state.slippage_tolerance = WAD;
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(20));

        fx.receive(provider, loan, FlashLoanIntent::Deleverage { amount: U256::ZERO })
            .unwrap();

        assert_eq!(fx.lending.debt_of(account), eth(50));
        assert_eq!(fx.lending.collateral_of(account), eth(80));
        assert_eq!(fx.state.holdings.base, U256::ZERO);
    }

    #[test]
    fn test_supply_dust_is_rejected() {
        let mut fx = Fixture::new();
        fx.staking.rate = from_bps(11000);
        fx.state.holdings.base = U256::from(1u8);
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(U256::ZERO);

        let err = fx
            .receive(
                provider,
                loan,
                FlashLoanIntent::Deposit {
                    amount: U256::from(1u8),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StrategyError::RoundingShortfall(_)));
        assert_eq!(fx.lending.collateral_of(fx.setup.account), U256::ZERO);
    }

    #[test]
    fn test_deleverage_keeps_dust_leftover_as_float() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.staking.rate = from_bps(11000);
        fx.lending.set_position(account, eth(100), eth(70));
        fx.state.holdings.base = eth(20) + U256::from(1u8);
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(20));

        fx.receive(
            provider,
            loan,
            FlashLoanIntent::Deleverage {
                amount: eth(20) + U256::from(1u8),
            },
        )
        .unwrap();

        assert_eq!(fx.lending.debt_of(account), eth(50));
        assert_eq!(fx.lending.collateral_of(account), eth(100));
        assert_eq!(fx.state.holdings.base, U256::from(1u8));
    }

    #[test]
    fn test_withdraw_dust_is_rejected() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.staking.rate = from_bps(11000);
        fx.lending.set_position(account, eth(100), eth(70));
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(U256::ZERO);

        // 1 wei of base is less than one wei of wrapped at 1.1 per wrapped
        let err = fx
            .receive(
                provider,
                loan,
                FlashLoanIntent::Withdraw {
                    amount: U256::from(1u8),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StrategyError::RoundingShortfall(_)));
    }

    #[test]
    fn test_withdraw_without_debt_keeps_remaining_collateral() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.lending.set_position(account, eth(100), U256::ZERO);
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(U256::ZERO);

        fx.receive(provider, loan, FlashLoanIntent::Withdraw { amount: eth(10) })
            .unwrap();

        assert_eq!(fx.lending.collateral_of(account), eth(90));
        assert_eq!(fx.lending.debt_of(account), U256::ZERO);
        assert_eq!(fx.state.holdings.base, eth(10));
    }

    #[test]
    fn test_zero_tolerance_accepts_any_price() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.lending.set_position(account, eth(100), eth(70));
        fx.state.slippage_tolerance = U256::ZERO;
        fx.exchange.rate = from_bps(9800);
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(35));

        fx.receive(provider, loan, FlashLoanIntent::Withdraw { amount: eth(15) })
            .unwrap();

        // 50 sold at 0.98 pays back the 35 loan and leaves 14
        assert_eq!(fx.lending.collateral_of(account), eth(50));
        assert_eq!(fx.state.holdings.base, eth(14));
    }

    #[test]
    fn test_zero_tolerance_deleverage_does_not_gross_up() {
        let mut fx = Fixture::new();
        let account = fx.setup.account;
        fx.lending.set_position(account, eth(100), eth(70));
        fx.state.slippage_tolerance = U256::ZERO;
        let provider = fx.setup.flash_loan_provider;
        let loan = fx.loan(eth(20));

        fx.receive(provider, loan, FlashLoanIntent::Deleverage { amount: U256::ZERO })
            .unwrap();

        // Exactly the 20 shortfall is sold
        assert_eq!(fx.lending.collateral_of(account), eth(80));
        assert_eq!(fx.lending.debt_of(account), eth(50));
        assert_eq!(fx.state.holdings.base, U256::ZERO);
    }

    #[test]
    fn test_intent_accessors() {
        let intent = FlashLoanIntent::Deleverage { amount: eth(3) };
        assert_eq!(intent.amount(), eth(3));
        assert!(!intent.is_deposit());
        assert_eq!(intent.label(), "deleverage");
    }
}
