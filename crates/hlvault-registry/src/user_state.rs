//! Subvault positions from `clearinghouseState`.
//!
//! Only what closing a position needs is modelled; unknown fields are
//! ignored so partial responses still parse.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// clearinghouseState response.
///
/// Endpoint: POST /info with `{"type": "clearinghouseState", "user": "<address>"}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClearinghouseStateResponse {
    #[serde(rename = "assetPositions", default)]
    pub asset_positions: Vec<AssetPositionEntry>,
}

impl ClearinghouseStateResponse {
    /// Position for `coin`, matched case-insensitively.
    pub fn position_for(&self, coin: &str) -> Option<&AssetPositionData> {
        let coin = coin.trim();
        self.asset_positions
            .iter()
            .map(|entry| &entry.position)
            .find(|position| position.coin.eq_ignore_ascii_case(coin))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetPositionEntry {
    pub position: AssetPositionData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetPositionData {
    pub coin: String,
    /// Signed size: negative is short.
    pub szi: String,
}

impl AssetPositionData {
    pub fn size_decimal(&self) -> Result<Decimal, rust_decimal::Error> {
        self.szi.trim().parse()
    }
}
