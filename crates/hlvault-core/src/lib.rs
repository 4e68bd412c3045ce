//! Core domain types for the hlvault strategy client.
//!
//! This crate provides the pieces every other layer builds on:
//! - `decimal`: exact fixed-point codec and exchange price formatting
//! - `order`: `OrderSide`, `TimeInForce`, `Cloid`
//! - `types`: `VerificationPayload`, `TxResult`, `ActionResponse`
//! - `error`: the validation / network / timeout error kinds

pub mod decimal;
pub mod error;
pub mod order;
pub mod types;

pub use decimal::{
    convert_perp_price, convert_spot_price, format_price_for_exchange, from_fixed_point,
    to_fixed_point, USD_DECIMALS, WIRE_DECIMALS,
};
pub use error::{CoreError, CoreResult};
pub use order::{Cloid, OrderSide, TimeInForce};
pub use types::{ActionResponse, BridgeDirection, ChainKind, TxResult, VerificationPayload};
