//! Per-session summary of dispatch outcomes.
//!
//! Reads the process-wide counters back so a CLI run can log what it
//! submitted before exiting.

use crate::metrics::{TX_CONFIRM_SECONDS, TX_FAILED_TOTAL, TX_SUBMITTED_TOTAL};
use chrono::{DateTime, Utc};
use tracing::info;

/// Dispatch statistics for one contract function.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStats {
    pub action: String,
    pub submitted: u64,
    pub failed: u64,
    pub confirmed: u64,
    pub confirm_mean_secs: f64,
}

/// Session statistics reporter.
pub struct SessionStatsReporter {
    actions: Vec<String>,
    started_at: DateTime<Utc>,
}

impl SessionStatsReporter {
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            started_at: Utc::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current statistics for every tracked action.
    pub fn get_stats(&self) -> Vec<ActionStats> {
        self.actions
            .iter()
            .map(|action| Self::action_stats(action))
            .collect()
    }

    fn action_stats(action: &str) -> ActionStats {
        let submitted = TX_SUBMITTED_TOTAL.with_label_values(&[action]).get() as u64;
        let failed = TX_FAILED_TOTAL.with_label_values(&[action]).get() as u64;
        let histogram = TX_CONFIRM_SECONDS.with_label_values(&[action]);
        let confirmed = histogram.get_sample_count();
        let confirm_mean_secs = if confirmed > 0 {
            histogram.get_sample_sum() / confirmed as f64
        } else {
            0.0
        };

        ActionStats {
            action: action.to_string(),
            submitted,
            failed,
            confirmed,
            confirm_mean_secs,
        }
    }

    /// Log one line per action that saw any traffic this session.
    pub fn log_summary(&self) {
        let elapsed = Utc::now() - self.started_at;
        for stats in self.get_stats() {
            if stats.submitted == 0 && stats.failed == 0 {
                continue;
            }
            info!(
                action = %stats.action,
                submitted = stats.submitted,
                failed = stats.failed,
                confirmed = stats.confirmed,
                confirm_mean_secs = stats.confirm_mean_secs,
                session_secs = elapsed.num_seconds(),
                "Session dispatch summary"
            );
        }
    }
}
