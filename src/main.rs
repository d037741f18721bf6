//! Keeper monitor for the leveraged wstETH strategy.
//!
//! Polls the live position on a fixed interval, logs its health and the
//! rebalance the engine would dispatch, and warns on LTV drift, on LTV near
//! the e-mode max, on debt at or above collateral and on a stale price feed.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::U256;
use alloy::providers::{Provider, ProviderBuilder};
use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lst_leverage_chain::{
    assess, flash_loan_calldata, Alert, MarketReader, ReaderTargets, RpcMarketReader,
};
use lst_leverage_core::wad::wad_to_f64;
use lst_leverage_core::{KeeperConfig, StrategyConfig};

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    // STRATEGY_CONFIG selects a file, otherwise STRATEGY_PROFILE a built-in profile
    let config = StrategyConfig::load_from_env()?;
    config.log_config();

    let (_, params) = config
        .resolve()
        .context("invalid strategy configuration")?;
    let targets = ReaderTargets::from_config(&config)?;

    let rpc_url = config.keeper.rpc_url();
    if rpc_url.starts_with("${") {
        bail!("RPC URL not set: export ETH_RPC_URL or set keeper.rpc_url");
    }

    let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
    let reader = RpcMarketReader::new(Arc::new(provider), targets).await?;

    info!(
        poll_interval_secs = config.keeper.poll_interval_secs,
        target_ltv = config.params.target_ltv,
        "Starting keeper loop"
    );
    run(&reader, &config.keeper, params.target_ltv).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,lst_leverage_core=debug,lst_leverage_chain=debug")
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn run<P>(reader: &RpcMarketReader<P>, keeper: &KeeperConfig, target_ltv: U256) -> Result<()>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(keeper.poll_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = poll_once(reader, keeper, target_ltv).await {
                    error!(error = format!("{e:#}"), "Keeper poll failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                return Ok(());
            }
        }
    }
}

async fn poll_once<P>(
    reader: &RpcMarketReader<P>,
    keeper: &KeeperConfig,
    target_ltv: U256,
) -> Result<()>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    let snapshot = reader.snapshot().await?;
    let report = snapshot.report(target_ltv)?;

    info!(
        block = report.block_number,
        ltv = wad_to_f64(report.ltv),
        target_ltv = wad_to_f64(report.target_ltv),
        max_ltv = wad_to_f64(report.max_ltv),
        leverage = report.leverage.map(wad_to_f64),
        total_assets = report.total_assets.map(wad_to_f64),
        float = wad_to_f64(report.position.float),
        "Position report"
    );

    if let Some(plan) = report.plan {
        info!(
            flash_loan = wad_to_f64(plan.flash_loan_amount),
            intent = plan.intent.label(),
            float = wad_to_f64(plan.intent.amount()),
            "Rebalance available"
        );
        let targets = reader.targets();
        debug!(
            calldata = %flash_loan_calldata(targets.account, targets.base_asset, &plan),
            "Balancer flashLoan calldata"
        );
    }

    for alert in assess(&snapshot, &report, keeper, unix_now()) {
        match alert {
            Alert::LtvDrift { ltv, target } => warn!(
                alert = alert.name(),
                ltv = wad_to_f64(ltv),
                target = wad_to_f64(target),
                "LTV drifted from target"
            ),
            Alert::NearMaxLtv { ltv, max_ltv } => warn!(
                alert = alert.name(),
                ltv = wad_to_f64(ltv),
                max_ltv = wad_to_f64(max_ltv),
                "LTV approaching e-mode maximum"
            ),
            Alert::Underwater { collateral, debt } => warn!(
                alert = alert.name(),
                collateral = wad_to_f64(collateral),
                debt = wad_to_f64(debt),
                "Debt at or above collateral value"
            ),
            Alert::StalePrice {
                updated_at,
                age_secs,
            } => warn!(
                alert = alert.name(),
                updated_at = updated_at,
                age_secs = age_secs,
                "Price feed answer is stale"
            ),
        }
    }

    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ┬  ┌─┐┌┬┐  ┬┌─┌─┐┌─┐┌─┐┌─┐┬─┐
    │  └─┐ │   ├┴┐├┤ ├┤ ├─┘├┤ ├┬┘
    ┴─┘└─┘ ┴   ┴ ┴└─┘└─┘┴  └─┘┴└─
    wstETH Leverage Keeper v0.1.0
    "#
    );
}
