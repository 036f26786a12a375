//! Default configuration constants.
//!
//! Callers share these constants instead of duplicating literals.

/// Embedded default `todo.toml` template written by `todo init`.
pub(super) const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../templates/todo.toml");
/// Default task API base URL.
pub(super) const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
/// Default per-request transport timeout.
pub(super) const DEFAULT_API_TIMEOUT_SECS: u64 = 15;
/// Delay before the scheduler re-checks a saturated rate window.
pub(super) const DEFAULT_SCHEDULER_DEFER_MS: u64 = 100;
pub(super) const DEFAULT_RETRY_MAX_RETRIES: u32 = 3;
pub(super) const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub(super) const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
pub(super) const DEFAULT_RETRY_MAX_MULTIPLIER: u32 = 10;
pub(super) const DEFAULT_RETRY_JITTER: f64 = 0.3;
pub(super) const DEFAULT_CACHE_SHORT_TTL_SECS: u64 = 10;
pub(super) const DEFAULT_CACHE_TTL_SECS: u64 = 30;
pub(super) const DEFAULT_CACHE_LONG_TTL_SECS: u64 = 300;
pub(super) const DEFAULT_CACHE_ERROR_TTL_SECS: u64 = 5;
/// Access tokens this close to `exp` are considered unusable.
pub(super) const DEFAULT_EXPIRY_BUFFER_SECS: u64 = 300;
