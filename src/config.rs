//! Runtime settings loaded from environment variables.

use std::time::Duration;

/// Default number of update/create requests in flight during a batch.
const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// Default timeout for one request to the remote catalog.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tunables for talking to the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSettings {
    /// Maximum concurrent requests during batch save/create (from LLM_PANEL_SAVE_CONCURRENCY)
    pub batch_concurrency: usize,
    /// Per-request timeout (from LLM_PANEL_TIMEOUT_SECS)
    pub request_timeout: Duration,
}

impl PanelSettings {
    pub fn from_env() -> Self {
        let batch_concurrency = std::env::var("LLM_PANEL_SAVE_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_BATCH_CONCURRENCY);

        let timeout_secs = std::env::var("LLM_PANEL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            batch_concurrency,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_concurrency = limit.max(1);
        self
    }
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
