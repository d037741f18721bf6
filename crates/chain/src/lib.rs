//! Chain layer for the leveraged liquid-staking strategy.
//!
//! This crate provides:
//! - Contract bindings for the Aave V3 pool, wstETH, Balancer and Chainlink
//! - The flash-loan user data codec and `flashLoan` calldata builder
//! - A market reader that snapshots the live position over JSON-RPC
//! - Position reports and keeper alert rules built on the core engine

pub mod contracts;
mod intent;
mod monitor;
mod reader;
mod snapshot;

pub use intent::{decode_flash_callback, decode_intent, encode_intent, flash_loan_calldata};
pub use monitor::{assess, Alert};
pub use reader::{MarketReader, ReaderTargets, RpcMarketReader};
pub use snapshot::{MarketSnapshot, PositionReport};
