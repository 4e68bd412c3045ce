//! Strategy client for the Hyperliquid strategy vault.
//!
//! - `client`: orders, cancels, transfers, market data and CCTP bridges
//! - `config`: TOML configuration with network defaults

pub mod client;
pub mod config;
pub mod error;

pub use client::{LimitOrder, StrategyClient, DEFAULT_SLIPPAGE, DISPATCHED_FUNCTIONS};
pub use config::{ClientConfig, SENDER_ENV};
pub use error::{ClientError, ClientResult};
