//! Configuration data model.
//!
//! This module holds struct/enum definitions plus default values. Loader and
//! source-resolution logic lives in the sibling modules so precedence rules
//! stay in one place.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::{
    DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECS, DEFAULT_CACHE_ERROR_TTL_SECS,
    DEFAULT_CACHE_LONG_TTL_SECS, DEFAULT_CACHE_SHORT_TTL_SECS, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_EXPIRY_BUFFER_SECS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_JITTER,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_RETRY_MAX_MULTIPLIER, DEFAULT_RETRY_MAX_RETRIES,
    DEFAULT_SCHEDULER_DEFER_MS,
};

/// Admission-limit preset matching the two shipped front ends.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientProfile {
    #[default]
    Web,
    Mobile,
}

impl ClientProfile {
    /// `(max_concurrent, rate_limit_per_second)` for this preset.
    pub fn limits(self) -> (usize, usize) {
        match self {
            Self::Web => (5, 8),
            Self::Mobile => (6, 10),
        }
    }
}

/// Backend used to persist access/refresh tokens.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    File,
    Memory,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub scheduler: SchedulerConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub display: DisplayConfig,
}

/// Config plus non-fatal notes gathered while loading it.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: Config,
    pub diagnostics: ConfigDiagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiagnostics {
    pub warnings: Vec<String>,
}

/// Raw on-disk shape; every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct FileConfig {
    pub(super) api: ApiConfig,
    pub(super) scheduler: FileSchedulerConfig,
    pub(super) retry: RetryConfig,
    pub(super) cache: CacheConfig,
    pub(super) auth: AuthConfig,
    pub(super) display: DisplayConfig,
}

/// HTTP endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request transport timeout.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.into(),
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Scheduler section as written by users: numeric limits are optional and
/// fall back to the selected profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct FileSchedulerConfig {
    pub(super) profile: ClientProfile,
    pub(super) max_concurrent: Option<usize>,
    pub(super) rate_limit_per_second: Option<usize>,
    pub(super) defer_ms: Option<u64>,
}

/// Resolved admission limits for the request scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub profile: ClientProfile,
    pub max_concurrent: usize,
    pub rate_limit_per_second: usize,
    /// Delay before re-attempting admission when the rate window is full.
    pub defer_ms: u64,
}

impl SchedulerConfig {
    pub fn for_profile(profile: ClientProfile) -> Self {
        let (max_concurrent, rate_limit_per_second) = profile.limits();
        Self {
            profile,
            max_concurrent,
            rate_limit_per_second,
            defer_ms: DEFAULT_SCHEDULER_DEFER_MS,
        }
    }

    pub fn defer_delay(&self) -> Duration {
        Duration::from_millis(self.defer_ms.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::for_profile(ClientProfile::default())
    }
}

impl From<FileSchedulerConfig> for SchedulerConfig {
    fn from(file: FileSchedulerConfig) -> Self {
        let base = Self::for_profile(file.profile);
        Self {
            profile: file.profile,
            max_concurrent: file.max_concurrent.unwrap_or(base.max_concurrent).max(1),
            rate_limit_per_second: file
                .rate_limit_per_second
                .unwrap_or(base.rate_limit_per_second)
                .max(1),
            defer_ms: file.defer_ms.unwrap_or(base.defer_ms).max(1),
        }
    }
}

/// Retry/backoff settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Absolute ceiling on one computed backoff delay.
    pub max_delay_ms: u64,
    /// Ceiling on the exponential multiplier applied to `base_delay_ms`.
    pub max_multiplier: u32,
    /// Upper bound (exclusive) of the uniform jitter fraction.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_RETRY_MAX_RETRIES,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            max_multiplier: DEFAULT_RETRY_MAX_MULTIPLIER,
            jitter: DEFAULT_RETRY_JITTER,
        }
    }
}

/// Response cache lifetimes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub short_ttl_secs: u64,
    pub default_ttl_secs: u64,
    pub long_ttl_secs: u64,
    /// How long a failed fetch shields its key from new attempts.
    pub error_ttl_secs: u64,
    pub cache_errors: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            short_ttl_secs: DEFAULT_CACHE_SHORT_TTL_SECS,
            default_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            long_ttl_secs: DEFAULT_CACHE_LONG_TTL_SECS,
            error_ttl_secs: DEFAULT_CACHE_ERROR_TTL_SECS,
            cache_errors: true,
        }
    }
}

/// Token persistence settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_store: TokenStoreKind,
    /// Override for the token file; defaults to `<config root>/todo/tokens.json`.
    pub token_store_path: Option<PathBuf>,
    /// Tokens expiring within this window are treated as already expired.
    pub expiry_buffer_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_store: TokenStoreKind::File,
            token_store_path: None,
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Outcome of `todo init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalConfigInitResult {
    Created { path: PathBuf },
    AlreadyInitialized { path: PathBuf },
    Overwritten { path: PathBuf, backup_path: PathBuf },
}
