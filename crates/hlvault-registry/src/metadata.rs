//! Asset and token metadata cache.
//!
//! Symbols map to perp asset ids (bulk-loaded from the info endpoint on a
//! miss until one load succeeds, or registered explicitly) and to spot token
//! indices (registration only). Size decimals come from the L1 read precompiles and
//! are memoized per asset id, including "unavailable" results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use hlvault_chain::PrecompileReader;
use hlvault_core::{
    convert_perp_price, convert_spot_price, format_price_for_exchange, from_fixed_point,
    CoreError, CoreResult, WIRE_DECIMALS,
};
use hlvault_telemetry::Metrics;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::DynInfoSource;
use crate::error::RegistryError;

const ASSET_SYMBOL_KEYS: &[&str] = &["symbol", "name", "asset", "ticker"];
const ASSET_ID_KEYS: &[&str] = &["assetId", "asset_id", "id", "assetIndex", "index"];
const TOKEN_SYMBOL_KEYS: &[&str] = &["symbol", "token", "name"];
const TOKEN_INDEX_KEYS: &[&str] = &["index", "tokenIndex", "id"];

/// Mid, best bid and best ask in human units. Empty book sides are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketPrices {
    pub mid: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

/// Price scale resolved for an asset id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceScale {
    Perp(u32),
    Spot(u32),
    Unknown,
}

/// Session-scoped symbol and decimals cache.
pub struct MetadataCache {
    info: DynInfoSource,
    precompiles: PrecompileReader,
    assets: RwLock<HashMap<String, u32>>,
    tokens: RwLock<HashMap<String, u64>>,
    loaded: AtomicBool,
    /// Serializes bulk loads so concurrent misses trigger one request.
    load_guard: tokio::sync::Mutex<()>,
    perp_decimals: RwLock<HashMap<u32, Option<u32>>>,
    spot_decimals: RwLock<HashMap<u32, Option<u32>>>,
}

impl MetadataCache {
    pub fn new(info: DynInfoSource, precompiles: PrecompileReader) -> Self {
        Self {
            info,
            precompiles,
            assets: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            loaded: AtomicBool::new(false),
            load_guard: tokio::sync::Mutex::new(()),
            perp_decimals: RwLock::new(HashMap::new()),
            spot_decimals: RwLock::new(HashMap::new()),
        }
    }

    /// Clear every table and memo.
    pub fn reset(&self) {
        self.assets.write().clear();
        self.tokens.write().clear();
        self.perp_decimals.write().clear();
        self.spot_decimals.write().clear();
        self.loaded.store(false, Ordering::SeqCst);
        debug!("Metadata cache reset");
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.read().len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.read().len()
    }

    /// Fetch `{"type":"meta"}` and map each universe entry's name to its
    /// position. Marks the cache loaded even when nothing was mapped.
    pub async fn load_from_info(&self) -> CoreResult<usize> {
        let meta = match self.info.fetch_meta().await {
            Ok(meta) => meta,
            Err(err) => {
                Metrics::metadata_load(false);
                return Err(err.into_network(self.info.endpoint()));
            }
        };

        let mapped = match meta.get("universe").and_then(Value::as_array) {
            Some(universe) => {
                let mut assets = self.assets.write();
                let mut mapped = 0;
                for (position, entry) in universe.iter().enumerate() {
                    let Some(name) = entry.get("name").and_then(value_to_symbol) else {
                        continue;
                    };
                    let Ok(asset_id) = u32::try_from(position) else {
                        continue;
                    };
                    assets.insert(name, asset_id);
                    mapped += 1;
                }
                mapped
            }
            None => {
                warn!(
                    error = %RegistryError::ParseError("missing 'universe' array".to_string()),
                    "Meta response missing universe"
                );
                0
            }
        };

        self.loaded.store(true, Ordering::SeqCst);
        Metrics::metadata_load(true);
        if mapped == 0 {
            warn!("Meta info call did not produce any symbol mappings");
        } else {
            info!(assets = mapped, "Loaded asset metadata from info endpoint");
        }
        Ok(mapped)
    }

    /// Register symbol -> asset id pairs.
    ///
    /// Accepts a JSON object (`{"ETH": 4}`) or an array of objects with a
    /// symbol key (`symbol`, `name`, `asset`, `ticker`) and an id key
    /// (`assetId`, `asset_id`, `id`, `assetIndex`, `index`). Entries that do
    /// not parse are skipped. Returns the number registered.
    pub fn register_asset_entries(&self, entries: &Value) -> usize {
        let pairs = collect_entries(entries, ASSET_SYMBOL_KEYS, ASSET_ID_KEYS);
        let mut assets = self.assets.write();
        let mut registered = 0;
        for (symbol, id) in pairs {
            match u32::try_from(id) {
                Ok(asset_id) => {
                    assets.insert(symbol, asset_id);
                    registered += 1;
                }
                Err(_) => debug!(symbol = %symbol, id, "Asset id out of range, skipped"),
            }
        }
        registered
    }

    /// Register symbol -> token index pairs. Same shapes as assets, with
    /// symbol keys `symbol`, `token`, `name` and index keys `index`,
    /// `tokenIndex`, `id`.
    pub fn register_token_entries(&self, entries: &Value) -> usize {
        let pairs = collect_entries(entries, TOKEN_SYMBOL_KEYS, TOKEN_INDEX_KEYS);
        let registered = pairs.len();
        self.tokens.write().extend(pairs);
        registered
    }

    /// Resolve an asset identifier to its id.
    ///
    /// Integer literals (decimal or `0x` hex) pass through. Symbols are
    /// matched case-insensitively; on a miss the info endpoint is consulted
    /// until one bulk load succeeds this session.
    pub async fn resolve_asset_id(&self, asset: &str) -> CoreResult<u32> {
        if let Some(literal) = parse_int_literal(asset) {
            return u32::try_from(literal).map_err(|_| {
                CoreError::range_exceeded("Asset id exceeds uint32", "asset", asset)
            });
        }

        let symbol = asset.trim().to_uppercase();
        let hit = self.assets.read().get(&symbol).copied();
        if let Some(id) = hit {
            return Ok(id);
        }

        if !self.is_loaded() {
            let _guard = self.load_guard.lock().await;
            // another task may have loaded while we waited
            if !self.is_loaded() {
                // left unloaded on failure so the next miss retries
                if let Err(err) = self.load_from_info().await {
                    warn!(error = %err, "Failed to load asset metadata from info endpoint");
                }
            }
            let hit = self.assets.read().get(&symbol).copied();
            if let Some(id) = hit {
                return Ok(id);
            }
        }

        Err(CoreError::validation(
            format!("Unknown asset symbol '{asset}'"),
            "asset",
            asset,
        ))
    }

    /// Resolve a token identifier from the registered table.
    pub fn resolve_token_index(&self, token: &str) -> CoreResult<u64> {
        if let Some(literal) = parse_int_literal(token) {
            return Ok(literal);
        }
        self.tokens
            .read()
            .get(&token.trim().to_uppercase())
            .copied()
            .ok_or_else(|| {
                CoreError::validation(
                    format!("Unknown token identifier '{token}'"),
                    "token",
                    token,
                )
            })
    }

    /// Perp `szDecimals` via `perpAssetInfo`; `None` when unavailable.
    pub async fn resolve_perp_sz_decimals(&self, asset_id: u32) -> Option<u32> {
        let cached = self.perp_decimals.read().get(&asset_id).copied();
        if let Some(cached) = cached {
            return cached;
        }

        let resolved = match self.precompiles.perp_asset_info(asset_id).await {
            Ok(info) => Some(u32::from(info.szDecimals)),
            Err(err) => {
                warn!(asset_id, error = %err, "perpAssetInfo unavailable");
                None
            }
        };
        self.perp_decimals.write().insert(asset_id, resolved);
        resolved
    }

    /// Spot base token `szDecimals` via `spotInfo` then `tokenInfo`.
    pub async fn resolve_spot_base_sz_decimals(&self, spot_id: u32) -> Option<u32> {
        let cached = self.spot_decimals.read().get(&spot_id).copied();
        if let Some(cached) = cached {
            return cached;
        }

        let resolved = self.read_spot_base_sz_decimals(spot_id).await;
        self.spot_decimals.write().insert(spot_id, resolved);
        resolved
    }

    async fn read_spot_base_sz_decimals(&self, spot_id: u32) -> Option<u32> {
        let spot = match self.precompiles.spot_info(spot_id).await {
            Ok(spot) => spot,
            Err(err) => {
                debug!(spot_id, error = %err, "spotInfo unavailable");
                return None;
            }
        };

        let base_token = u32::try_from(spot.tokens[0]).ok()?;
        match self.precompiles.token_info(base_token).await {
            Ok(token) => Some(u32::from(token.szDecimals)),
            Err(err) => {
                debug!(spot_id, base_token, error = %err, "tokenInfo unavailable");
                None
            }
        }
    }

    async fn price_scale(&self, asset_id: u32) -> PriceScale {
        if let Some(sz) = self.resolve_perp_sz_decimals(asset_id).await {
            return PriceScale::Perp(sz);
        }
        if let Some(sz) = self.resolve_spot_base_sz_decimals(asset_id).await {
            return PriceScale::Spot(sz);
        }
        PriceScale::Unknown
    }

    /// Round `price` to the exchange's tick rules for `asset_id`.
    ///
    /// Unknown assets get the price back unchanged.
    pub async fn format_limit_price(&self, asset_id: u32, price: Decimal) -> CoreResult<Decimal> {
        match self.price_scale(asset_id).await {
            PriceScale::Perp(sz) => format_price_for_exchange(price, sz, true),
            PriceScale::Spot(sz) => format_price_for_exchange(price, sz, false),
            PriceScale::Unknown => Ok(price),
        }
    }

    /// Convert raw precompile prices for `asset_id` to human units.
    ///
    /// Falls back to the 8-decimal wire scale for unknown assets.
    pub async fn convert_market_prices(
        &self,
        asset_id: u32,
        mid: u64,
        bid: u64,
        ask: u64,
    ) -> CoreResult<MarketPrices> {
        let scale = self.price_scale(asset_id).await;
        let convert = |units: u64| match scale {
            PriceScale::Perp(sz) => convert_perp_price(units, sz),
            PriceScale::Spot(sz) => convert_spot_price(units, sz),
            PriceScale::Unknown => from_fixed_point(units, WIRE_DECIMALS),
        };
        let side = |units: u64| -> CoreResult<Option<Decimal>> {
            if units == 0 {
                Ok(None)
            } else {
                convert(units).map(Some)
            }
        };

        Ok(MarketPrices {
            mid: convert(mid)?,
            bid: side(bid)?,
            ask: side(ask)?,
        })
    }
}

/// Parse a decimal or `0x` hex integer literal.
pub(crate) fn parse_int_literal(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).ok();
    }
    trimmed.parse().ok()
}

/// Ids arrive as JSON numbers or numeric strings.
fn coerce_int(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_int_literal(s),
        _ => None,
    }
}

fn value_to_symbol(value: &Value) -> Option<String> {
    let symbol = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!symbol.is_empty()).then(|| symbol.to_uppercase())
}

fn first_present<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .find(|value| !value.is_null())
}

fn collect_entries(entries: &Value, symbol_keys: &[&str], id_keys: &[&str]) -> Vec<(String, u64)> {
    match entries {
        Value::Object(map) => map
            .iter()
            .filter_map(|(symbol, value)| {
                let id = coerce_int(value)?;
                let symbol = symbol.trim().to_uppercase();
                (!symbol.is_empty()).then_some((symbol, id))
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter(|entry| entry.is_object())
            .filter_map(|entry| {
                let symbol = first_present(entry, symbol_keys).and_then(value_to_symbol)?;
                let id = first_present(entry, id_keys).and_then(coerce_int)?;
                Some((symbol, id))
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockInfoSource;
    use alloy::sol_types::SolValue;
    use hlvault_chain::abi::{
        PerpAssetInfo, SpotInfo, TokenInfo, PERP_ASSET_INFO_PRECOMPILE, SPOT_INFO_PRECOMPILE,
        TOKEN_INFO_PRECOMPILE,
    };
    use hlvault_chain::MockEvmRpc;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;

    fn meta() -> Value {
        json!({"universe": [
            {"name": "BTC", "szDecimals": 5},
            {"name": "eth", "szDecimals": 4},
            {"szDecimals": 2},
            {"name": "SOL", "szDecimals": 2}
        ]})
    }

    fn cache_with(meta: Option<Value>) -> (Arc<MockInfoSource>, Arc<MockEvmRpc>, MetadataCache) {
        let info = Arc::new(MockInfoSource::with_meta(meta));
        let rpc = Arc::new(MockEvmRpc::new("mock://hyper"));
        let cache = MetadataCache::new(info.clone(), PrecompileReader::new(rpc.clone()));
        (info, rpc, cache)
    }

    fn perp_info(sz: u8) -> Vec<u8> {
        PerpAssetInfo {
            coin: "ETH".to_string(),
            marginTableId: 1,
            szDecimals: sz,
            maxLeverage: 25,
            onlyIsolated: false,
        }
        .abi_encode()
    }

    fn token_info(sz: u8) -> Vec<u8> {
        TokenInfo {
            name: "PURR".to_string(),
            spots: vec![0],
            deployerTradingFeeShare: 0,
            deployer: Default::default(),
            evmContract: Default::default(),
            szDecimals: sz,
            weiDecimals: 5,
            evmExtraWeiDecimals: 0,
        }
        .abi_encode()
    }

    #[tokio::test]
    async fn test_lazy_load_happens_once() {
        let (info, _rpc, cache) = cache_with(Some(meta()));

        assert_eq!(cache.resolve_asset_id("eth").await.unwrap(), 1);
        assert_eq!(cache.resolve_asset_id("SOL").await.unwrap(), 3);
        let err = cache.resolve_asset_id("DOGE").await.unwrap_err();
        assert_eq!(err.field(), Some("asset"));
        assert!(err.to_string().contains("Unknown asset symbol 'DOGE'"));

        assert_eq!(info.meta_calls(), 1);
        assert!(cache.is_loaded());
    }

    #[tokio::test]
    async fn test_literal_ids_skip_lookup() {
        let (info, _rpc, cache) = cache_with(Some(meta()));
        assert_eq!(cache.resolve_asset_id("7").await.unwrap(), 7);
        assert_eq!(cache.resolve_asset_id("0x10").await.unwrap(), 16);
        assert!(cache.resolve_asset_id("0x100000000").await.is_err());
        assert_eq!(info.meta_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let (info, _rpc, cache) = cache_with(None);
        assert!(cache.resolve_asset_id("ETH").await.unwrap_err().is_validation());
        assert!(!cache.is_loaded());
        assert!(cache.resolve_asset_id("BTC").await.is_err());
        assert_eq!(info.meta_calls(), 2);

        // endpoint recovers: the next miss loads, later misses do not
        info.set_meta(Some(meta()));
        assert_eq!(cache.resolve_asset_id("ETH").await.unwrap(), 1);
        assert!(cache.is_loaded());
        assert!(cache.resolve_asset_id("DOGE").await.is_err());
        assert_eq!(info.meta_calls(), 3);
    }

    #[tokio::test]
    async fn test_missing_universe_marks_loaded() {
        let (_info, _rpc, cache) = cache_with(Some(json!({"other": []})));
        assert_eq!(cache.load_from_info().await.unwrap(), 0);
        assert!(cache.is_loaded());
    }

    #[tokio::test]
    async fn test_registered_assets_resolve_without_load() {
        let (info, _rpc, cache) = cache_with(Some(meta()));
        let registered = cache.register_asset_entries(&json!([
            {"symbol": "hype", "assetId": 150},
            {"ticker": "PURR", "index": "0x2"},
            {"name": "BAD", "id": "not-a-number"},
            "skip-me"
        ]));
        assert_eq!(registered, 2);
        assert_eq!(cache.resolve_asset_id("HYPE").await.unwrap(), 150);
        assert_eq!(cache.resolve_asset_id("purr").await.unwrap(), 2);
        assert_eq!(info.meta_calls(), 0);

        assert_eq!(cache.register_asset_entries(&json!({"arb": " 11 "})), 1);
        assert_eq!(cache.resolve_asset_id("ARB").await.unwrap(), 11);
    }

    #[test]
    fn test_token_registration_and_lookup() {
        let (_info, _rpc, cache) = cache_with(None);
        cache.register_token_entries(&json!([
            {"token": "usdc", "tokenIndex": 0},
            {"symbol": "PURR", "id": "1"}
        ]));
        assert_eq!(cache.resolve_token_index("USDC").unwrap(), 0);
        assert_eq!(cache.resolve_token_index("purr").unwrap(), 1);
        assert_eq!(cache.resolve_token_index("42").unwrap(), 42);

        let err = cache.resolve_token_index("FOO").unwrap_err();
        assert_eq!(err.field(), Some("token"));
        assert_eq!(cache.token_count(), 2);
    }

    #[tokio::test]
    async fn test_perp_decimals_memoized() {
        let (_info, rpc, cache) = cache_with(None);
        rpc.on_call(PERP_ASSET_INFO_PRECOMPILE, Vec::new(), perp_info(4));

        assert_eq!(cache.resolve_perp_sz_decimals(1).await, Some(4));
        assert_eq!(cache.resolve_perp_sz_decimals(1).await, Some(4));
        assert_eq!(rpc.call_count_to(PERP_ASSET_INFO_PRECOMPILE), 1);
    }

    #[tokio::test]
    async fn test_unavailable_decimals_memoized() {
        let (_info, rpc, cache) = cache_with(None);
        assert_eq!(cache.resolve_perp_sz_decimals(9).await, None);
        assert_eq!(cache.resolve_perp_sz_decimals(9).await, None);
        assert_eq!(rpc.call_count_to(PERP_ASSET_INFO_PRECOMPILE), 1);

        cache.reset();
        assert_eq!(cache.resolve_perp_sz_decimals(9).await, None);
        assert_eq!(rpc.call_count_to(PERP_ASSET_INFO_PRECOMPILE), 2);
    }

    #[tokio::test]
    async fn test_spot_decimals_follow_base_token() {
        let (_info, rpc, cache) = cache_with(None);
        rpc.on_call(
            SPOT_INFO_PRECOMPILE,
            Vec::new(),
            SpotInfo {
                name: "PURR/USDC".to_string(),
                tokens: [1, 0],
            }
            .abi_encode(),
        );
        rpc.on_call(TOKEN_INFO_PRECOMPILE, Vec::new(), token_info(0));

        assert_eq!(cache.resolve_spot_base_sz_decimals(10000).await, Some(0));
        let calls = rpc.calls();
        let token_call = calls
            .iter()
            .find(|(to, _)| *to == TOKEN_INFO_PRECOMPILE)
            .unwrap();
        // base token id is the uint32 argument
        assert_eq!(token_call.1[31], 1);
    }

    #[tokio::test]
    async fn test_format_limit_price_prefers_perp() {
        let (_info, rpc, cache) = cache_with(None);
        rpc.on_call(PERP_ASSET_INFO_PRECOMPILE, Vec::new(), perp_info(3));
        assert_eq!(
            cache.format_limit_price(0, dec!(1234.56)).await.unwrap(),
            dec!(1234.6)
        );
        assert_eq!(rpc.call_count_to(SPOT_INFO_PRECOMPILE), 0);
    }

    #[tokio::test]
    async fn test_format_limit_price_unknown_asset_unchanged() {
        let (_info, _rpc, cache) = cache_with(None);
        assert_eq!(
            cache.format_limit_price(77, dec!(1.234567)).await.unwrap(),
            dec!(1.234567)
        );
    }

    #[tokio::test]
    async fn test_convert_market_prices() {
        let (_info, rpc, cache) = cache_with(None);
        rpc.on_call(PERP_ASSET_INFO_PRECOMPILE, Vec::new(), perp_info(4));

        // perp prices carry 6 - 4 = 2 decimals
        let prices = cache.convert_market_prices(1, 350_050, 350_000, 0).await.unwrap();
        assert_eq!(prices.mid, dec!(3500.5));
        assert_eq!(prices.bid, Some(dec!(3500)));
        assert_eq!(prices.ask, None);
    }

    #[tokio::test]
    async fn test_convert_market_prices_unknown_uses_wire_scale() {
        let (_info, _rpc, cache) = cache_with(None);
        let prices = cache
            .convert_market_prices(5, 150_000_000, 0, 151_000_000)
            .await
            .unwrap();
        assert_eq!(prices.mid, dec!(1.5));
        assert_eq!(prices.bid, None);
        assert_eq!(prices.ask, Some(dec!(1.51)));
    }

    #[test]
    fn test_parse_int_literal() {
        assert_eq!(parse_int_literal("42"), Some(42));
        assert_eq!(parse_int_literal(" 0xff "), Some(255));
        assert_eq!(parse_int_literal("ETH"), None);
        assert_eq!(parse_int_literal("-1"), None);
    }
}
