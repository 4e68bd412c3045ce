//! Prometheus metrics for hlvault.
//!
//! Covers:
//! - Contract calls submitted / failed per function
//! - Receipt confirmation latency
//! - CCTP bridge stage outcomes and Iris polling
//! - Metadata bulk loads
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A failed registration
//! means duplicate metric names, a fatal configuration error that should crash
//! at startup. These panics only occur during static initialization.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Contract calls handed to the RPC node.
/// Labels: action (contract function name)
pub static TX_SUBMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlvault_tx_submitted_total",
        "Total strategy contract calls submitted",
        &["action"]
    )
    .unwrap()
});

/// Contract calls that failed at submission or receipt wait.
pub static TX_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlvault_tx_failed_total",
        "Total strategy contract calls that failed",
        &["action"]
    )
    .unwrap()
});

/// Seconds between submission and receipt.
pub static TX_CONFIRM_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "hlvault_tx_confirm_seconds",
        "Time from submission to receipt in seconds",
        &["action"],
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]
    )
    .unwrap()
});

/// CCTP bridge stage transitions.
/// Labels: direction, stage (connect/normalize/quote_fee/burn/attestation/claim), outcome (ok/failed)
pub static BRIDGE_STAGE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlvault_bridge_stage_total",
        "CCTP bridge stage outcomes",
        &["direction", "stage", "outcome"]
    )
    .unwrap()
});

/// Iris attestation polls.
/// Labels: outcome (complete/pending/empty/not_found/error)
pub static IRIS_POLLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlvault_iris_polls_total",
        "Iris attestation poll results",
        &["outcome"]
    )
    .unwrap()
});

/// Bulk asset metadata loads from the info endpoint.
pub static METADATA_LOADS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hlvault_metadata_loads_total",
        "Asset metadata bulk loads",
        &["outcome"]
    )
    .unwrap()
});

/// Metrics helper for convenient access.
pub struct Metrics;

impl Metrics {
    // =========================================================================
    // Dispatch
    // =========================================================================

    pub fn tx_submitted(action: &str) {
        TX_SUBMITTED_TOTAL.with_label_values(&[action]).inc();
    }

    pub fn tx_failed(action: &str) {
        TX_FAILED_TOTAL.with_label_values(&[action]).inc();
    }

    /// Record receipt latency in seconds.
    pub fn tx_confirmed(action: &str, seconds: f64) {
        TX_CONFIRM_SECONDS
            .with_label_values(&[action])
            .observe(seconds);
    }

    // =========================================================================
    // Bridge
    // =========================================================================

    pub fn bridge_stage(direction: &str, stage: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        BRIDGE_STAGE_TOTAL
            .with_label_values(&[direction, stage, outcome])
            .inc();
    }

    pub fn iris_poll(outcome: &str) {
        IRIS_POLLS_TOTAL.with_label_values(&[outcome]).inc();
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn metadata_load(ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        METADATA_LOADS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = TX_SUBMITTED_TOTAL
            .with_label_values(&["test_counters_increment"])
            .get();
        Metrics::tx_submitted("test_counters_increment");
        Metrics::tx_submitted("test_counters_increment");
        let after = TX_SUBMITTED_TOTAL
            .with_label_values(&["test_counters_increment"])
            .get();
        assert_eq!(after - before, 2.0);
    }

    #[test]
    fn test_bridge_stage_outcome_label() {
        Metrics::bridge_stage("test_dir", "burn", false);
        let failed = BRIDGE_STAGE_TOTAL
            .with_label_values(&["test_dir", "burn", "failed"])
            .get();
        assert_eq!(failed, 1.0);
    }

    #[test]
    fn test_gather_text_contains_registered_metric() {
        Metrics::iris_poll("pending");
        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("hlvault_iris_polls_total"));
    }
}
