//! Prometheus metrics and structured logging for hlvault.
//!
//! - Prometheus counters for contract dispatch and bridge stages
//! - Structured logging with tracing (JSON in production)
//! - Per-session summary of dispatch outcomes

pub mod error;
pub mod logging;
pub mod metrics;
pub mod session_stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use session_stats::{ActionStats, SessionStatsReporter};
