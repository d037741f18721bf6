//! In-memory collaborators for unit tests.

use alloy::primitives::{Address, U256};
use std::collections::HashMap;

use crate::error::{StrategyError, StrategyResult};
use crate::flash::{FlashLoan, FlashLoanIntent};
use crate::market::{
    Environment, ExchangePool, FlashLoanProvider, FlashLoanReceiver, LendingMarket, MarketView,
    Markets, PriceData, PriceOracle, RateMode, StakingProtocol, VaultShell, WrapRate,
};
use crate::strategy::{StrategyParams, StrategySetup};
use crate::wad::{self, from_bps, WAD};

pub const STRATEGY: Address = Address::repeat_byte(0x01);
pub const BASE: Address = Address::repeat_byte(0x02);
pub const DERIVATIVE: Address = Address::repeat_byte(0x03);
pub const WRAPPED: Address = Address::repeat_byte(0x04);
pub const FLASH_PROVIDER: Address = Address::repeat_byte(0x05);
pub const EXCHANGE: Address = Address::repeat_byte(0x06);
pub const PRICE_FEED: Address = Address::repeat_byte(0x07);

/// Whole units with 18 decimals.
pub fn eth(units: u64) -> U256 {
    U256::from(units) * WAD
}

pub fn test_setup() -> StrategySetup {
    StrategySetup {
        account: STRATEGY,
        base_asset: BASE,
        derivative: DERIVATIVE,
        wrapped: WRAPPED,
        flash_loan_provider: FLASH_PROVIDER,
        exchange: EXCHANGE,
        price_feed: PRICE_FEED,
        risk_category: 1,
    }
}

pub fn test_params() -> StrategyParams {
    StrategyParams {
        target_ltv: from_bps(7000),
        slippage_tolerance: from_bps(9900),
        performance_fee: from_bps(1000),
    }
}

#[derive(Debug, Clone)]
pub struct MockOracle {
    pub address: Address,
    pub price: U256,
}

impl MockOracle {
    pub fn new(price: U256) -> Self {
        Self {
            address: PRICE_FEED,
            price,
        }
    }
}

impl PriceOracle for MockOracle {
    fn address(&self) -> Address {
        self.address
    }

    fn latest_price(&self) -> StrategyResult<PriceData> {
        Ok(PriceData {
            price: self.price,
            decimals: 18,
            updated_at: 1_700_000_000,
        })
    }
}

/// Stakes 1:1 and wraps at `rate` derivative per wrapped.
#[derive(Debug, Clone)]
pub struct MockStaking {
    pub rate: U256,
}

impl MockStaking {
    pub fn new(rate: U256) -> Self {
        Self { rate }
    }
}

impl WrapRate for MockStaking {
    fn derivative_per_wrapped(&self) -> StrategyResult<U256> {
        Ok(self.rate)
    }

    fn wrapped_per_derivative(&self) -> StrategyResult<U256> {
        Ok(wad::div_wad_down(WAD, self.rate)?)
    }
}

impl StakingProtocol for MockStaking {
    fn stake(&mut self, amount: U256) -> StrategyResult<U256> {
        Ok(amount)
    }

    fn wrap(&mut self, derivative: U256) -> StrategyResult<U256> {
        Ok(wad::div_wad_down(derivative, self.rate)?)
    }

    fn unwrap(&mut self, wrapped: U256) -> StrategyResult<U256> {
        Ok(wad::mul_wad_down(wrapped, self.rate)?)
    }
}

/// Tracks collateral (wrapped units) and debt per account. No health checks.
#[derive(Debug, Clone)]
pub struct MockLending {
    pub max_ltv: U256,
    collateral: HashMap<Address, U256>,
    debt: HashMap<Address, U256>,
}

impl MockLending {
    pub fn new(max_ltv: U256) -> Self {
        Self {
            max_ltv,
            collateral: HashMap::new(),
            debt: HashMap::new(),
        }
    }

    pub fn set_position(&mut self, account: Address, collateral: U256, debt: U256) {
        self.collateral.insert(account, collateral);
        self.debt.insert(account, debt);
    }

    pub fn collateral_of(&self, account: Address) -> U256 {
        self.collateral.get(&account).copied().unwrap_or_default()
    }

    pub fn debt_of(&self, account: Address) -> U256 {
        self.debt.get(&account).copied().unwrap_or_default()
    }
}

impl LendingMarket for MockLending {
    fn supply(&mut self, account: Address, _asset: Address, amount: U256) -> StrategyResult<()> {
        *self.collateral.entry(account).or_default() += amount;
        Ok(())
    }

    fn borrow(
        &mut self,
        account: Address,
        _asset: Address,
        amount: U256,
        _mode: RateMode,
    ) -> StrategyResult<()> {
        *self.debt.entry(account).or_default() += amount;
        Ok(())
    }

    fn repay(
        &mut self,
        account: Address,
        _asset: Address,
        amount: U256,
        _mode: RateMode,
    ) -> StrategyResult<U256> {
        let debt = self.debt.entry(account).or_default();
        let repaid = amount.min(*debt);
        *debt -= repaid;
        Ok(repaid)
    }

    fn withdraw(&mut self, account: Address, _asset: Address, amount: U256) -> StrategyResult<U256> {
        let balance = self.collateral.entry(account).or_default();
        let amount = if amount == U256::MAX { *balance } else { amount };
        if amount > *balance {
            return Err(StrategyError::external(
                "lending",
                format!("withdraw {amount} exceeds collateral {balance}"),
            ));
        }
        *balance -= amount;
        Ok(amount)
    }

    fn max_ltv(&self, _category: u8) -> StrategyResult<U256> {
        Ok(self.max_ltv)
    }

    fn collateral_balance(&self, account: Address) -> StrategyResult<U256> {
        Ok(self.collateral_of(account))
    }

    fn debt_balance(&self, account: Address) -> StrategyResult<U256> {
        Ok(self.debt_of(account))
    }
}

/// Pays `rate` base per derivative regardless of the oracle.
#[derive(Debug, Clone)]
pub struct MockExchange {
    pub address: Address,
    pub rate: U256,
}

impl MockExchange {
    pub fn new(address: Address, rate: U256) -> Self {
        Self { address, rate }
    }
}

impl ExchangePool for MockExchange {
    fn address(&self) -> Address {
        self.address
    }

    fn exchange(
        &mut self,
        _from: Address,
        _to: Address,
        amount: U256,
        min_out: U256,
    ) -> StrategyResult<U256> {
        let out = wad::mul_wad_down(amount, self.rate)?;
        if out < min_out {
            return Err(StrategyError::Slippage {
                quoted: out,
                min_out,
            });
        }
        Ok(out)
    }
}

/// Charges `fee_rate` of the principal, rounded up.
#[derive(Debug, Clone)]
pub struct MockFlashLender {
    pub address: Address,
    pub fee_rate: U256,
    pub fees_collected: U256,
}

impl FlashLoanProvider for MockFlashLender {
    fn address(&self) -> Address {
        self.address
    }

    fn flash_loan(
        &mut self,
        receiver: &mut dyn FlashLoanReceiver,
        asset: Address,
        amount: U256,
        intent: FlashLoanIntent,
    ) -> StrategyResult<()> {
        let loan = FlashLoan {
            asset,
            amount,
            fee: wad::mul_wad_up(amount, self.fee_rate)?,
        };
        let owed = loan.owed()?;
        let repaid = receiver.receive_flash_loan(self.address, &loan, intent)?;
        if repaid < owed {
            return Err(StrategyError::FlashLoanNotRepaid { owed, repaid });
        }
        self.fees_collected += loan.fee;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MockVault {
    pub share_price: U256,
    pub fee_assets: U256,
    pub minted_shares: U256,
}

impl VaultShell for MockVault {
    fn mint_performance_fee(&mut self, assets: U256) -> StrategyResult<U256> {
        let shares = wad::div_wad_down(assets, self.share_price)?;
        self.fee_assets += assets;
        self.minted_shares += shares;
        Ok(shares)
    }
}

/// Full environment at price 1, wrap rate 1, pool rate 1, max LTV 0.9.
#[derive(Debug, Clone)]
pub struct TestEnv {
    pub oracle: MockOracle,
    pub staking: MockStaking,
    pub lending: MockLending,
    pub exchange: MockExchange,
    pub flash: MockFlashLender,
    pub vault: MockVault,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            oracle: MockOracle::new(WAD),
            staking: MockStaking::new(WAD),
            lending: MockLending::new(from_bps(9000)),
            exchange: MockExchange::new(EXCHANGE, WAD),
            flash: MockFlashLender {
                address: FLASH_PROVIDER,
                fee_rate: U256::ZERO,
                fees_collected: U256::ZERO,
            },
            vault: MockVault {
                share_price: WAD,
                fee_assets: U256::ZERO,
                minted_shares: U256::ZERO,
            },
        }
    }
}

impl Environment for TestEnv {
    fn markets(&mut self) -> Markets<'_> {
        Markets {
            oracle: &self.oracle,
            staking: &mut self.staking,
            lending: &mut self.lending,
            exchange: &mut self.exchange,
            flash: &mut self.flash,
            vault: &mut self.vault,
        }
    }

    fn view(&self) -> MarketView<'_> {
        MarketView {
            oracle: &self.oracle,
            rates: &self.staking,
            lending: &self.lending,
        }
    }
}
