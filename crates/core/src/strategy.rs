//! Strategy state and the vault-facing operations.
//!
//! Every mutating operation runs through [`Strategy::transact`]: it works on
//! a copy of the strategy and the environment and commits both only if the
//! whole operation succeeds.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::accounting::{self, Position};
use crate::error::{ConfigError, Holding, StrategyError, StrategyResult};
use crate::events::StrategyEvent;
use crate::market::{Environment, MarketView, PriceOracle};
use crate::rebalance::RebalancePlan;
use crate::units::UnitConverter;
use crate::wad::{self, WAD};

/// Fixed wiring of a strategy instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySetup {
    /// Account holding the lending position
    pub account: Address,
    /// Asset borrowed and held as float
    pub base_asset: Address,
    /// Liquid-staking derivative
    pub derivative: Address,
    /// Wrapped derivative posted as collateral
    pub wrapped: Address,
    pub flash_loan_provider: Address,
    pub exchange: Address,
    pub price_feed: Address,
    /// Lending-market risk category (e-mode)
    pub risk_category: u8,
}

impl StrategySetup {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("account", self.account),
            ("base_asset", self.base_asset),
            ("derivative", self.derivative),
            ("wrapped", self.wrapped),
            ("flash_loan_provider", self.flash_loan_provider),
            ("exchange", self.exchange),
            ("price_feed", self.price_feed),
        ];
        for (field, address) in fields {
            if address.is_zero() {
                return Err(ConfigError::ZeroAddress { field });
            }
        }
        Ok(())
    }
}

/// Admin parameters supplied at initialization. All WAD fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub target_ltv: U256,
    pub slippage_tolerance: U256,
    pub performance_fee: U256,
}

/// Tokens the strategy holds directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    /// Idle base asset (the float)
    pub base: U256,
    pub derivative: U256,
    pub wrapped: U256,
}

impl Holdings {
    fn slot(&mut self, asset: Holding) -> &mut U256 {
        match asset {
            Holding::Base => &mut self.base,
            Holding::Derivative => &mut self.derivative,
            Holding::Wrapped => &mut self.wrapped,
        }
    }

    pub fn credit(&mut self, asset: Holding, amount: U256) -> StrategyResult<()> {
        let slot = self.slot(asset);
        *slot = wad::add(*slot, amount)?;
        Ok(())
    }

    pub fn debit(&mut self, asset: Holding, amount: U256) -> StrategyResult<()> {
        let slot = self.slot(asset);
        if amount > *slot {
            return Err(StrategyError::InsufficientBalance {
                asset,
                needed: amount,
                available: *slot,
            });
        }
        *slot -= amount;
        Ok(())
    }
}

/// Mutable strategy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyState {
    pub target_ltv: U256,
    pub slippage_tolerance: U256,
    pub performance_fee: U256,
    /// Last checkpointed value in base units
    pub total_invested: U256,
    /// Cumulative realized profit
    pub total_profit: U256,
    pub holdings: Holdings,
}

/// A leveraged liquid-staking position.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub(crate) setup: StrategySetup,
    pub(crate) state: StrategyState,
    pub(crate) events: Vec<StrategyEvent>,
}

impl Strategy {
    /// Validate wiring and parameters against the market and create the
    /// strategy with an empty position.
    pub fn initialize<E: Environment>(
        setup: StrategySetup,
        params: StrategyParams,
        env: &E,
    ) -> StrategyResult<Self> {
        setup.validate()?;
        check_fraction("slippage_tolerance", params.slippage_tolerance)?;
        check_fraction("performance_fee", params.performance_fee)?;

        let view = env.view();
        check_price_feed(&setup, view.oracle)?;
        let max_ltv = accounting::max_ltv(view.lending, setup.risk_category)?;
        check_target_ltv(params.target_ltv, max_ltv)?;

        info!(
            account = %setup.account,
            target_ltv = wad::wad_to_f64(params.target_ltv),
            max_ltv = wad::wad_to_f64(max_ltv),
            risk_category = setup.risk_category,
            "Strategy initialized"
        );

        Ok(Self {
            setup,
            state: StrategyState {
                target_ltv: params.target_ltv,
                slippage_tolerance: params.slippage_tolerance,
                performance_fee: params.performance_fee,
                total_invested: U256::ZERO,
                total_profit: U256::ZERO,
                holdings: Holdings::default(),
            },
            events: Vec::new(),
        })
    }

    pub fn setup(&self) -> &StrategySetup {
        &self.setup
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    /// Idle base asset.
    pub fn float(&self) -> U256 {
        self.state.holdings.base
    }

    /// Take the events recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<StrategyEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run `op` against copies of the strategy and the environment, keeping
    /// both only when it succeeds.
    pub(crate) fn transact<E, T, F>(&mut self, env: &mut E, op: F) -> StrategyResult<T>
    where
        E: Environment,
        F: FnOnce(&mut Self, &mut E) -> StrategyResult<T>,
    {
        let mut strategy = self.clone();
        let mut scratch = env.clone();
        match op(&mut strategy, &mut scratch) {
            Ok(out) => {
                *self = strategy;
                *env = scratch;
                Ok(out)
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "Strategy operation reverted");
                Err(err)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Accounting
    // ---------------------------------------------------------------------

    /// Current position valued through the price feed and wrap rate.
    pub fn position(&self, view: MarketView<'_>) -> StrategyResult<Position> {
        check_price_feed(&self.setup, view.oracle)?;
        let converter = UnitConverter::new(view.oracle, view.rates);
        Position::read(view.lending, self.setup.account, self.float(), &converter)
    }

    pub fn total_collateral(&self, view: MarketView<'_>) -> StrategyResult<U256> {
        Ok(self.position(view)?.collateral)
    }

    pub fn total_debt(&self, view: MarketView<'_>) -> StrategyResult<U256> {
        view.lending.debt_balance(self.setup.account)
    }

    pub fn total_assets(&self, view: MarketView<'_>) -> StrategyResult<U256> {
        self.position(view)?.total_assets()
    }

    pub fn leverage(&self, view: MarketView<'_>) -> StrategyResult<U256> {
        self.position(view)?.leverage()
    }

    pub fn ltv(&self, view: MarketView<'_>) -> StrategyResult<U256> {
        self.position(view)?.ltv()
    }

    pub fn max_ltv(&self, view: MarketView<'_>) -> StrategyResult<U256> {
        accounting::max_ltv(view.lending, self.setup.risk_category)
    }

    // ---------------------------------------------------------------------
    // Vault-facing operations
    // ---------------------------------------------------------------------

    /// Put the float to work at the current target.
    #[instrument(skip_all, fields(account = %self.setup.account))]
    pub fn deposit_into_strategy<E: Environment>(
        &mut self,
        env: &mut E,
    ) -> StrategyResult<Option<RebalancePlan>> {
        self.transact(env, |strategy, env| strategy.rebalance_position(env))
    }

    /// Rebalance to the current target; same as [`Self::deposit_into_strategy`].
    pub fn rebalance<E: Environment>(
        &mut self,
        env: &mut E,
    ) -> StrategyResult<Option<RebalancePlan>> {
        self.deposit_into_strategy(env)
    }

    /// Unwind `amount` of net equity into the float without moving the LTV.
    #[instrument(skip_all, fields(account = %self.setup.account, amount = %amount))]
    pub fn withdraw_to_vault<E: Environment>(
        &mut self,
        env: &mut E,
        amount: U256,
    ) -> StrategyResult<RebalancePlan> {
        self.transact(env, |strategy, env| strategy.withdraw_position(env, amount))
    }

    /// Unwind the part of a vault withdrawal of `assets` the float does not
    /// cover.
    ///
    /// Sale proceeds within the slippage tolerance can leave the float a
    /// little short of `assets`, so the vault re-checks with
    /// [`Self::release_float`].
    #[instrument(skip_all, fields(account = %self.setup.account, assets = %assets))]
    pub fn before_withdraw<E: Environment>(
        &mut self,
        env: &mut E,
        assets: U256,
    ) -> StrategyResult<()> {
        let float = self.float();
        if assets <= float {
            return Ok(());
        }
        let missing = assets - float;
        self.transact(env, |strategy, env| {
            strategy.state.total_invested = strategy.state.total_invested.saturating_sub(missing);
            strategy.withdraw_position(env, missing)?;
            Ok(())
        })
    }

    /// Base asset transferred in by the vault.
    pub fn deposit_float(&mut self, amount: U256) -> StrategyResult<()> {
        self.state.holdings.credit(Holding::Base, amount)
    }

    /// Base asset transferred out to the vault.
    pub fn release_float(&mut self, amount: U256) -> StrategyResult<()> {
        self.state.holdings.debit(Holding::Base, amount)
    }

    // ---------------------------------------------------------------------
    // Admin
    // ---------------------------------------------------------------------

    /// Set a new target LTV and rebalance to it.
    #[instrument(skip_all, fields(account = %self.setup.account))]
    pub fn change_leverage<E: Environment>(
        &mut self,
        env: &mut E,
        new_target: U256,
    ) -> StrategyResult<Option<RebalancePlan>> {
        self.transact(env, |strategy, env| {
            let max_ltv = strategy.max_ltv(env.view())?;
            check_target_ltv(new_target, max_ltv)?;

            let old = strategy.state.target_ltv;
            strategy.state.target_ltv = new_target;
            let plan = strategy.rebalance_position(env)?;

            info!(
                old = wad::wad_to_f64(old),
                new = wad::wad_to_f64(new_target),
                "Leverage changed"
            );
            strategy
                .events
                .push(StrategyEvent::LeverageChanged { old, new: new_target });
            Ok(plan)
        })
    }

    pub fn set_slippage_tolerance(&mut self, tolerance: U256) -> StrategyResult<()> {
        check_fraction("slippage_tolerance", tolerance)?;
        let old = std::mem::replace(&mut self.state.slippage_tolerance, tolerance);
        info!(old = %old, new = %tolerance, "Slippage tolerance updated");
        self.events.push(StrategyEvent::SlippageToleranceUpdated {
            old,
            new: tolerance,
        });
        Ok(())
    }

    pub fn set_performance_fee(&mut self, fee: U256) -> StrategyResult<()> {
        check_fraction("performance_fee", fee)?;
        let old = std::mem::replace(&mut self.state.performance_fee, fee);
        info!(old = %old, new = %fee, "Performance fee updated");
        self.events
            .push(StrategyEvent::PerformanceFeeUpdated { old, new: fee });
        Ok(())
    }

    pub fn set_exchange(&mut self, exchange: Address) -> StrategyResult<()> {
        if exchange.is_zero() {
            return Err(ConfigError::ZeroAddress { field: "exchange" }.into());
        }
        let old = std::mem::replace(&mut self.setup.exchange, exchange);
        info!(old = %old, new = %exchange, "Exchange updated");
        self.events
            .push(StrategyEvent::ExchangeUpdated { old, new: exchange });
        Ok(())
    }

    pub fn set_price_feed(&mut self, price_feed: Address) -> StrategyResult<()> {
        if price_feed.is_zero() {
            return Err(ConfigError::ZeroAddress {
                field: "price_feed",
            }
            .into());
        }
        let old = std::mem::replace(&mut self.setup.price_feed, price_feed);
        info!(old = %old, new = %price_feed, "Price feed updated");
        self.events.push(StrategyEvent::PriceFeedUpdated {
            old,
            new: price_feed,
        });
        Ok(())
    }
}

fn check_fraction(field: &'static str, value: U256) -> Result<(), ConfigError> {
    if value > WAD {
        return Err(ConfigError::FractionOutOfRange { field, value });
    }
    Ok(())
}

fn check_target_ltv(target: U256, max: U256) -> Result<(), ConfigError> {
    if target >= max {
        return Err(ConfigError::TargetLtvTooHigh { target, max });
    }
    Ok(())
}

fn check_price_feed(
    setup: &StrategySetup,
    oracle: &dyn PriceOracle,
) -> Result<(), ConfigError> {
    if oracle.address() != setup.price_feed {
        return Err(ConfigError::AddressMismatch {
            field: "price_feed",
            expected: setup.price_feed,
            actual: oracle.address(),
        });
    }
    Ok(())
}
