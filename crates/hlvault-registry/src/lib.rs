//! Asset metadata for the hlvault strategy client.
//!
//! - `client`: info endpoint access (`meta`, `clearinghouseState`)
//! - `metadata`: symbol -> id tables and memoized size decimals
//! - `user_state`: clearinghouse state response types

pub mod client;
pub mod error;
pub mod metadata;
pub mod user_state;

pub use client::{
    DynInfoSource, InfoClient, InfoSource, MockInfoSource, MAINNET_INFO_URL, TESTNET_INFO_URL,
};
pub use error::{RegistryError, RegistryResult};
pub use metadata::{MarketPrices, MetadataCache};
pub use user_state::{AssetPositionData, AssetPositionEntry, ClearinghouseStateResponse};
