//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`TODO_BASE_URL`, `TODO_API_TIMEOUT_SECS`,
//!    `TODO_MAX_CONCURRENT`, `TODO_RATE_LIMIT_PER_SECOND`, `TODO_MAX_RETRIES`)
//! 2. TOML file specified via --config CLI flag
//! 3. ./todo.toml in the current directory
//! 4. $XDG_CONFIG_HOME/todo/todo.toml (or ~/.config/todo/todo.toml)
//! 5. Built-in defaults

mod defaults;
mod env;
mod init;
mod loader;
mod sources;
mod types;

pub use init::{
    config_root_dir, default_global_config_path, default_token_store_path,
    initialize_default_global_config,
};
pub use loader::{load_config, load_config_with_diagnostics};
pub use types::{
    ApiConfig, AuthConfig, CacheConfig, ClientProfile, Config, ConfigDiagnostics, DisplayConfig,
    GlobalConfigInitResult, LoadedConfig, RetryConfig, SchedulerConfig, TokenStoreKind,
};
use types::FileConfig;
