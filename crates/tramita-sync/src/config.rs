//! Engine configuration.

use std::time::Duration;

/// Public DataJud endpoint root; the court alias is appended per request.
pub const DEFAULT_BASE_URL: &str = "https://api-publica.datajud.cnj.jus.br";

/// Tuning knobs for one sync pass.
///
/// Defaults reproduce the production cron profile: hourly trigger, 24 h
/// staleness window, 500 processes per run, batches of 50 with a 5 s pause,
/// and a 30 s cooldown when the API rate-limits.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub api_key: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Attempts per court batch before the batch degrades.
    pub max_retries: u32,
    /// Linear backoff step between transient-failure attempts.
    pub backoff_step: Duration,
    /// Cooldown after an HTTP 429; does not consume a retry attempt.
    pub rate_limit_pause: Duration,
    /// Processes per batch (and the `size` of each terms query).
    pub batch_size: usize,
    /// Pause between successive batches.
    pub batch_pause: Duration,
    /// A process is due once unchecked for this long.
    pub staleness_window: chrono::Duration,
    /// Upper bound on due processes handled in one run.
    pub max_per_run: usize,
    /// Buffered projection updates per bulk write-back.
    pub projection_batch: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
            backoff_step: Duration::from_secs(5),
            rate_limit_pause: Duration::from_secs(30),
            batch_size: 50,
            batch_pause: Duration::from_secs(5),
            staleness_window: chrono::Duration::hours(24),
            max_per_run: 500,
            projection_batch: 100,
        }
    }
}
