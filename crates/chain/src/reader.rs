//! RPC market reader.
//! Fetches every value a [`MarketSnapshot`] needs with typed Alloy calls.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use lst_leverage_core::wad::from_bps;
use lst_leverage_core::{PriceData, StrategyConfig};

use crate::contracts::{IAavePool, IAggregatorV3, IERC20, IWstETH};
use crate::snapshot::MarketSnapshot;

/// Source of market snapshots.
#[async_trait]
pub trait MarketReader: Send + Sync {
    async fn snapshot(&self) -> Result<MarketSnapshot>;
}

/// Addresses the reader queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderTargets {
    pub account: Address,
    pub lending_pool: Address,
    pub base_asset: Address,
    pub wrapped: Address,
    pub price_feed: Address,
    pub risk_category: u8,
}

impl ReaderTargets {
    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        let (setup, _) = config.resolve().context("invalid strategy configuration")?;
        Ok(Self {
            account: setup.account,
            lending_pool: config.lending_pool()?,
            base_asset: setup.base_asset,
            wrapped: setup.wrapped,
            price_feed: setup.price_feed,
            risk_category: setup.risk_category,
        })
    }
}

/// Reads snapshots over JSON-RPC through a shared provider.
#[derive(Clone)]
pub struct RpcMarketReader<P> {
    provider: Arc<P>,
    targets: ReaderTargets,
}

impl<P> std::fmt::Debug for RpcMarketReader<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcMarketReader")
            .field("targets", &self.targets)
            .finish()
    }
}

impl<P: Provider + Clone + 'static> RpcMarketReader<P> {
    /// Create a reader and verify the endpoint answers.
    pub async fn new(provider: Arc<P>, targets: ReaderTargets) -> Result<Self> {
        info!(
            pool = %targets.lending_pool,
            account = %targets.account,
            risk_category = targets.risk_category,
            "Initializing market reader"
        );

        let block = provider
            .get_block_number()
            .await
            .context("RPC endpoint unreachable")?;
        info!(block = block, "Provider connection verified");

        Ok(Self { provider, targets })
    }

    pub fn targets(&self) -> &ReaderTargets {
        &self.targets
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> MarketReader for RpcMarketReader<P> {
    async fn snapshot(&self) -> Result<MarketSnapshot> {
        let targets = &self.targets;
        let provider = &*self.provider;
        let pool = IAavePool::new(targets.lending_pool, provider);

        // aToken of the collateral and variable debt token of the base asset
        let collateral_reserve_call = pool.getReserveData(targets.wrapped);
        let debt_reserve_call = pool.getReserveData(targets.base_asset);
        let (collateral_reserve, debt_reserve) =
            tokio::join!(collateral_reserve_call.call(), debt_reserve_call.call());
        let a_token = collateral_reserve
            .context("getReserveData(collateral) failed")?
            .aTokenAddress;
        let variable_debt_token = debt_reserve
            .context("getReserveData(debt) failed")?
            .variableDebtTokenAddress;

        let feed = IAggregatorV3::new(targets.price_feed, provider);
        let wrapper = IWstETH::new(targets.wrapped, provider);
        let collateral_token = IERC20::new(a_token, provider);
        let debt_token = IERC20::new(variable_debt_token, provider);
        let base_token = IERC20::new(targets.base_asset, provider);

        let round_call = feed.latestRoundData();
        let decimals_call = feed.decimals();
        let st_per_token_call = wrapper.stEthPerToken();
        let tokens_per_st_call = wrapper.tokensPerStEth();
        let collateral_call = collateral_token.balanceOf(targets.account);
        let debt_call = debt_token.balanceOf(targets.account);
        let float_call = base_token.balanceOf(targets.account);
        let emode_call = pool.getEModeCategoryData(targets.risk_category);
        let user_emode_call = pool.getUserEMode(targets.account);

        // All reads in parallel
        let (
            block,
            round,
            decimals,
            st_per_token,
            tokens_per_st,
            collateral,
            debt,
            float,
            emode,
            user_emode,
        ) = tokio::join!(
            provider.get_block_number(),
            round_call.call(),
            decimals_call.call(),
            st_per_token_call.call(),
            tokens_per_st_call.call(),
            collateral_call.call(),
            debt_call.call(),
            float_call.call(),
            emode_call.call(),
            user_emode_call.call(),
        );

        let round = round.context("latestRoundData failed")?;
        // Negative answers are treated as zero and rejected on use
        let answer = if round.answer.is_negative() {
            U256::ZERO
        } else {
            U256::from_limbs(round.answer.into_raw().into_limbs())
        };
        let price = PriceData {
            price: answer,
            decimals: decimals.context("decimals failed")?._0,
            updated_at: round.updatedAt.saturating_to::<u64>(),
        };

        let emode = emode.context("getEModeCategoryData failed")?._0;
        let user_emode = user_emode.context("getUserEMode failed")?._0;
        if user_emode != U256::from(targets.risk_category) {
            warn!(
                account = %targets.account,
                expected = targets.risk_category,
                actual = %user_emode,
                "Account is not in the configured e-mode category"
            );
        }

        let snapshot = MarketSnapshot {
            block_number: block.context("eth_blockNumber failed")?,
            price_feed: targets.price_feed,
            price,
            derivative_per_wrapped: st_per_token.context("stEthPerToken failed")?._0,
            wrapped_per_derivative: tokens_per_st.context("tokensPerStEth failed")?._0,
            collateral_wrapped: collateral.context("collateral balanceOf failed")?._0,
            debt: debt.context("debt balanceOf failed")?._0,
            float: float.context("float balanceOf failed")?._0,
            max_ltv: from_bps(emode.ltv),
        };

        debug!(
            block = snapshot.block_number,
            collateral = %snapshot.collateral_wrapped,
            debt = %snapshot.debt,
            float = %snapshot.float,
            price = %snapshot.price.price,
            emode = %emode.label,
            "Market snapshot fetched"
        );

        Ok(snapshot)
    }
}
