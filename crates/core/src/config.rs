//! Configuration management with profile support.
//!
//! Addresses default to the Ethereum mainnet deployment (WETH, Lido stETH,
//! wstETH, Aave V3 e-mode 1, Balancer vault, Curve stETH/ETH pool, Chainlink
//! stETH/ETH feed). Only the strategy account has no default.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, StrategyResult};
use crate::strategy::{StrategyParams, StrategySetup};
use crate::wad::{self, WAD};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    #[serde(default)]
    pub strategy: StrategySection,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub contracts: ContractsConfig,

    /// Admin parameters
    #[serde(default)]
    pub params: ParamsConfig,

    /// Keeper monitor settings
    #[serde(default)]
    pub keeper: KeeperConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Strategy identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySection {
    #[serde(default = "default_strategy_name")]
    pub name: String,

    /// Account holding the lending position
    #[serde(default)]
    pub account: String,

    /// Lending-market risk category (e-mode)
    #[serde(default = "default_risk_category")]
    pub risk_category: u8,
}

fn default_strategy_name() -> String {
    "wsteth-leverage".to_string()
}
fn default_risk_category() -> u8 {
    1
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            name: default_strategy_name(),
            account: String::new(),
            risk_category: default_risk_category(),
        }
    }
}

/// Token addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_base")]
    pub base: String,
    #[serde(default = "default_derivative")]
    pub derivative: String,
    #[serde(default = "default_wrapped")]
    pub wrapped: String,
}

fn default_base() -> String {
    "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".to_string()
}
fn default_derivative() -> String {
    "0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84".to_string()
}
fn default_wrapped() -> String {
    "0x7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0".to_string()
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            derivative: default_derivative(),
            wrapped: default_wrapped(),
        }
    }
}

/// Collaborator contract addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default = "default_lending_pool")]
    pub lending_pool: String,
    #[serde(default = "default_flash_loan_provider")]
    pub flash_loan_provider: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_price_feed")]
    pub price_feed: String,
}

fn default_lending_pool() -> String {
    "0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2".to_string()
}
fn default_flash_loan_provider() -> String {
    "0xBA12222222228d8Ba445958a75a0704d566BF2C8".to_string()
}
fn default_exchange() -> String {
    "0xDC24316b9AE028F1497c275EB9192a3Ea0f67022".to_string()
}
fn default_price_feed() -> String {
    "0x86392dC19c0b719886221c78AB11eb8Cf5c52812".to_string()
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            lending_pool: default_lending_pool(),
            flash_loan_provider: default_flash_loan_provider(),
            exchange: default_exchange(),
            price_feed: default_price_feed(),
        }
    }
}

/// Admin parameters as decimal fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsConfig {
    #[serde(default = "default_target_ltv")]
    pub target_ltv: f64,

    /// Minimum accepted fraction of oracle value on exchanges
    #[serde(default = "default_slippage_tolerance")]
    pub slippage_tolerance: f64,

    #[serde(default = "default_performance_fee")]
    pub performance_fee: f64,
}

fn default_target_ltv() -> f64 {
    0.85
}
fn default_slippage_tolerance() -> f64 {
    0.99
}
fn default_performance_fee() -> f64 {
    0.1
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            target_ltv: default_target_ltv(),
            slippage_tolerance: default_slippage_tolerance(),
            performance_fee: default_performance_fee(),
        }
    }
}

/// Keeper monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// HTTP RPC endpoint, `${VAR}` is read from the environment
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Alert when |ltv - target| exceeds this
    #[serde(default = "default_ltv_drift_alert")]
    pub ltv_drift_alert: f64,

    /// Alert when ltv comes within this of max LTV
    #[serde(default = "default_max_ltv_margin")]
    pub max_ltv_margin: f64,

    /// Alert when the price feed is older than this
    #[serde(default = "default_price_staleness")]
    pub price_staleness_secs: u64,
}

fn default_rpc_url() -> String {
    "${ETH_RPC_URL}".to_string()
}
fn default_poll_interval() -> u64 {
    60
}
fn default_ltv_drift_alert() -> f64 {
    0.02
}
fn default_max_ltv_margin() -> f64 {
    0.03
}
fn default_price_staleness() -> u64 {
    86_400
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            poll_interval_secs: default_poll_interval(),
            ltv_drift_alert: default_ltv_drift_alert(),
            max_ltv_margin: default_max_ltv_margin(),
            price_staleness_secs: default_price_staleness(),
        }
    }
}

impl KeeperConfig {
    pub fn rpc_url(&self) -> String {
        expand_env(&self.rpc_url)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            strategy: StrategySection::default(),
            assets: AssetsConfig::default(),
            contracts: ContractsConfig::default(),
            params: ParamsConfig::default(),
            keeper: KeeperConfig::default(),
        }
    }
}

impl StrategyConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Lower leverage, tighter exchange bound.
    pub fn conservative() -> Self {
        Self {
            profile: "conservative".to_string(),
            params: ParamsConfig {
                target_ltv: 0.75,
                slippage_tolerance: 0.995,
                performance_fee: default_performance_fee(),
            },
            keeper: KeeperConfig {
                ltv_drift_alert: 0.01,
                max_ltv_margin: 0.08,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Leverage close to the e-mode limit.
    pub fn aggressive() -> Self {
        Self {
            profile: "aggressive".to_string(),
            params: ParamsConfig {
                target_ltv: 0.9,
                slippage_tolerance: 0.98,
                performance_fee: default_performance_fee(),
            },
            keeper: KeeperConfig {
                poll_interval_secs: 15,
                ltv_drift_alert: 0.01,
                max_ltv_margin: 0.015,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Get profile from environment variable STRATEGY_PROFILE, or default.
    /// Supported values: conservative, default, aggressive
    pub fn from_profile_env() -> Self {
        let profile = std::env::var("STRATEGY_PROFILE").unwrap_or_else(|_| "default".to_string());
        match profile.to_lowercase().as_str() {
            "conservative" | "safe" => Self::conservative(),
            "aggressive" | "aggro" => Self::aggressive(),
            _ => Self::default(),
        }
    }

    /// Load from `STRATEGY_CONFIG` if set, otherwise use the profile from
    /// `STRATEGY_PROFILE`. `STRATEGY_ACCOUNT` overrides the account.
    pub fn load_from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var("STRATEGY_CONFIG") {
            Ok(path) => Self::from_file(&path)
                .map_err(|e| anyhow::anyhow!("failed to load config {path}: {e}"))?,
            Err(_) => Self::from_profile_env(),
        };
        if let Ok(account) = std::env::var("STRATEGY_ACCOUNT") {
            config.strategy.account = account;
        }
        Ok(config)
    }

    /// Parse addresses and fractions into the strategy's wiring.
    pub fn resolve(&self) -> StrategyResult<(StrategySetup, StrategyParams)> {
        let setup = StrategySetup {
            account: parse_address("strategy.account", &self.strategy.account)?,
            base_asset: parse_address("assets.base", &self.assets.base)?,
            derivative: parse_address("assets.derivative", &self.assets.derivative)?,
            wrapped: parse_address("assets.wrapped", &self.assets.wrapped)?,
            flash_loan_provider: parse_address(
                "contracts.flash_loan_provider",
                &self.contracts.flash_loan_provider,
            )?,
            exchange: parse_address("contracts.exchange", &self.contracts.exchange)?,
            price_feed: parse_address("contracts.price_feed", &self.contracts.price_feed)?,
            risk_category: self.strategy.risk_category,
        };
        setup.validate()?;

        let params = StrategyParams {
            target_ltv: parse_fraction("params.target_ltv", self.params.target_ltv)?,
            slippage_tolerance: parse_fraction(
                "params.slippage_tolerance",
                self.params.slippage_tolerance,
            )?,
            performance_fee: parse_fraction("params.performance_fee", self.params.performance_fee)?,
        };
        Ok((setup, params))
    }

    /// Lending pool address, read by the chain layer only.
    pub fn lending_pool(&self) -> StrategyResult<Address> {
        Ok(parse_address("contracts.lending_pool", &self.contracts.lending_pool)?)
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(
            profile = %self.profile,
            strategy = %self.strategy.name,
            account = %self.strategy.account,
            risk_category = self.strategy.risk_category,
            "Strategy configuration loaded"
        );
        tracing::info!(
            base = %self.assets.base,
            derivative = %self.assets.derivative,
            wrapped = %self.assets.wrapped,
            "Assets"
        );
        tracing::info!(
            lending_pool = %self.contracts.lending_pool,
            flash_loan_provider = %self.contracts.flash_loan_provider,
            exchange = %self.contracts.exchange,
            price_feed = %self.contracts.price_feed,
            "Contracts"
        );
        tracing::info!(
            target_ltv = self.params.target_ltv,
            slippage_tolerance = self.params.slippage_tolerance,
            performance_fee = self.params.performance_fee,
            "Strategy parameters"
        );
        tracing::info!(
            poll_interval_secs = self.keeper.poll_interval_secs,
            ltv_drift_alert = self.keeper.ltv_drift_alert,
            max_ltv_margin = self.keeper.max_ltv_margin,
            "Keeper settings"
        );
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    let value = expand_env(value.trim());
    if value.is_empty() {
        return Err(ConfigError::ZeroAddress { field });
    }
    Address::from_str(&value).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: format!("{value}: {e}"),
    })
}

fn parse_fraction(field: &'static str, value: f64) -> Result<U256, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} is not a non-negative fraction"),
        });
    }
    let wad_value = wad::f64_to_wad(value);
    if wad_value > WAD {
        return Err(ConfigError::FractionOutOfRange {
            field,
            value: wad_value,
        });
    }
    Ok(wad_value)
}

/// Expand a whole-string `${VAR}` reference; anything else is returned as is.
pub fn expand_env(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}
