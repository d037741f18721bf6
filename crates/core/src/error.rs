//! Error taxonomy for the position-management engine.
//!
//! Every failure aborts the enclosing operation; nothing here is recovered
//! locally. Callers classify with [`StrategyError::kind`] and log with
//! [`StrategyError::code`].

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Result alias used across the core.
pub type StrategyResult<T> = Result<T, StrategyError>;

/// Top-level strategy error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// An admin-supplied parameter or collaborator wiring is invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The flash-loan callback was invoked by someone other than the provider.
    #[error("invalid flash loan caller {caller}, expected {expected}")]
    InvalidFlashLoanCaller { caller: Address, expected: Address },

    /// The exchange could not meet the minimum output bound.
    #[error("slippage exceeded: exchange quoted {quoted}, minimum {min_out}")]
    Slippage { quoted: U256, min_out: U256 },

    /// Checked arithmetic failed.
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    /// A non-zero request resolved to zero units after rounding.
    #[error("rounding shortfall: {0}")]
    RoundingShortfall(&'static str),

    /// The receiver returned less than principal plus fee.
    #[error("flash loan not repaid: owed {owed}, repaid {repaid}")]
    FlashLoanNotRepaid { owed: U256, repaid: U256 },

    /// The strategy does not hold enough of an asset to complete a step.
    #[error("insufficient {asset} balance: needed {needed}, available {available}")]
    InsufficientBalance {
        asset: Holding,
        needed: U256,
        available: U256,
    },

    /// The price feed returned an unusable answer.
    #[error("oracle error: {0}")]
    Oracle(String),

    /// A collaborator rejected a call.
    #[error("{service} call failed: {reason}")]
    External { service: &'static str, reason: String },
}

/// Invalid parameters, rejected before any state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must not be the zero address")]
    ZeroAddress { field: &'static str },

    #[error("{field} must be a fraction in [0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: U256 },

    #[error("target LTV {target} must be below max LTV {max}")]
    TargetLtvTooHigh { target: U256, max: U256 },

    #[error("{field} is {actual}, strategy is configured for {expected}")]
    AddressMismatch {
        field: &'static str,
        expected: Address,
        actual: Address,
    },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Arithmetic failures. These never wrap or truncate silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("overflow")]
    Overflow,

    #[error("underflow")]
    Underflow,

    #[error("zero net equity: collateral {collateral}, debt {debt}")]
    ZeroEquity { collateral: U256, debt: U256 },

    #[error("insolvent: debt {debt} exceeds collateral {collateral} plus float {float}")]
    Insolvent {
        collateral: U256,
        debt: U256,
        float: U256,
    },
}

/// Token balances the strategy holds directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Holding {
    Base,
    Derivative,
    Wrapped,
}

impl std::fmt::Display for Holding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => f.write_str("base asset"),
            Self::Derivative => f.write_str("staking derivative"),
            Self::Wrapped => f.write_str("wrapped derivative"),
        }
    }
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Authorization,
    Slippage,
    Arithmetic,
    RoundingShortfall,
    /// Collaborator-level failure (oracle, market, repayment, balances).
    Execution,
}

impl StrategyError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidFlashLoanCaller { .. } => ErrorKind::Authorization,
            Self::Slippage { .. } => ErrorKind::Slippage,
            Self::Arithmetic(_) => ErrorKind::Arithmetic,
            Self::RoundingShortfall(_) => ErrorKind::RoundingShortfall,
            Self::FlashLoanNotRepaid { .. }
            | Self::InsufficientBalance { .. }
            | Self::Oracle(_)
            | Self::External { .. } => ErrorKind::Execution,
        }
    }

    /// Stable error code for logs and alerts.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(ConfigError::ZeroAddress { .. }) => "CFG_ZERO_ADDRESS",
            Self::Configuration(ConfigError::FractionOutOfRange { .. }) => "CFG_FRACTION_RANGE",
            Self::Configuration(ConfigError::TargetLtvTooHigh { .. }) => "CFG_TARGET_LTV",
            Self::Configuration(ConfigError::AddressMismatch { .. }) => "CFG_ADDRESS_MISMATCH",
            Self::Configuration(ConfigError::InvalidValue { .. }) => "CFG_INVALID_VALUE",
            Self::InvalidFlashLoanCaller { .. } => "AUTH_FLASH_CALLER",
            Self::Slippage { .. } => "SLIPPAGE",
            Self::Arithmetic(ArithmeticError::DivisionByZero) => "MATH_DIV_ZERO",
            Self::Arithmetic(ArithmeticError::Overflow) => "MATH_OVERFLOW",
            Self::Arithmetic(ArithmeticError::Underflow) => "MATH_UNDERFLOW",
            Self::Arithmetic(ArithmeticError::ZeroEquity { .. }) => "MATH_ZERO_EQUITY",
            Self::Arithmetic(ArithmeticError::Insolvent { .. }) => "MATH_INSOLVENT",
            Self::RoundingShortfall(_) => "ROUNDING_SHORTFALL",
            Self::FlashLoanNotRepaid { .. } => "FLASH_NOT_REPAID",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::Oracle(_) => "ORACLE",
            Self::External { .. } => "EXTERNAL",
        }
    }

    /// Shorthand for collaborator failures.
    pub fn external(service: &'static str, reason: impl Into<String>) -> Self {
        Self::External {
            service,
            reason: reason.into(),
        }
    }
}
