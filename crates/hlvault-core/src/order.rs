//! Order-related types and identifiers.
//!
//! Provides order side, time-in-force, and the 128-bit client order ID the
//! strategy contract forwards to CoreWriter.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Time-in-force for orders.
///
/// The discriminant is the `uint8` the strategy contract expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TimeInForce {
    /// Add-liquidity-only.
    #[serde(rename = "Alo")]
    AddLiquidityOnly = 1,
    /// Good-til-cancelled.
    #[default]
    #[serde(rename = "Gtc")]
    GoodTilCancelled = 2,
    /// Immediate-or-cancel. Market orders always use this.
    #[serde(rename = "Ioc")]
    ImmediateOrCancel = 3,
}

impl TimeInForce {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl FromStr for TimeInForce {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALO" => Ok(Self::AddLiquidityOnly),
            "GTC" => Ok(Self::GoodTilCancelled),
            "IOC" => Ok(Self::ImmediateOrCancel),
            _ => Err(CoreError::validation(
                "Time in force must be one of ALO, GTC, IOC",
                "tif",
                s,
            )),
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddLiquidityOnly => write!(f, "ALO"),
            Self::GoodTilCancelled => write!(f, "GTC"),
            Self::ImmediateOrCancel => write!(f, "IOC"),
        }
    }
}

/// Client order ID, a `uint128` on the wire.
///
/// Zero means "no cloid" to the contract, so generated ids are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Cloid(u128);

impl Cloid {
    /// Create a new random client order ID.
    pub fn random() -> Self {
        loop {
            let value = Uuid::new_v4().as_u128();
            if value != 0 {
                return Self(value);
            }
        }
    }

    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// Parse `0x`-prefixed hex or a plain decimal integer.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) if !hex.is_empty() => u128::from_str_radix(hex, 16),
            Some(_) => {
                return Err(CoreError::validation("Cloid cannot be empty", "cloid", raw));
            }
            None => trimmed.parse::<u128>(),
        };

        parsed.map(Self).map_err(|_| {
            CoreError::validation(
                "Cloid must be a uint128 as 0x-hex or decimal",
                "cloid",
                raw,
            )
        })
    }
}

impl fmt::Display for Cloid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:032x}", self.0)
    }
}

impl FromStr for Cloid {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

impl From<Cloid> for String {
    fn from(cloid: Cloid) -> Self {
        cloid.to_string()
    }
}

impl TryFrom<String> for Cloid {
    type Error = CoreError;

    fn try_from(s: String) -> CoreResult<Self> {
        Self::parse(&s)
    }
}
