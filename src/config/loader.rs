//! Top-level config loading pipeline.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::env::apply_runtime_env_overrides;
use super::init::config_root_dir;
use super::sources::{collect_source_warnings, read_config_text_with_sources};
use super::{Config, ConfigDiagnostics, FileConfig, LoadedConfig};

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    Ok(load_config_with_diagnostics(path_override)?.config)
}

/// Load configuration and return non-fatal diagnostics.
pub fn load_config_with_diagnostics(
    path_override: Option<&str>,
) -> Result<LoadedConfig, ConfigError> {
    load_config_with_diagnostics_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

pub(super) fn load_config_with_diagnostics_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<LoadedConfig, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (config_text, source) =
        read_config_text_with_sources(path_override, &read_file, &config_root)?;
    let mut diagnostics = ConfigDiagnostics::default();
    collect_source_warnings(&source, &config_root, &mut diagnostics);

    let parsed: FileConfig = toml::from_str(&config_text)?;
    let mut config = resolve_file_config(parsed)?;
    apply_runtime_env_overrides(&mut config, &env_lookup)?;

    Ok(LoadedConfig {
        config,
        diagnostics,
    })
}

fn resolve_file_config(parsed: FileConfig) -> Result<Config, ConfigError> {
    let base_url = parsed.api.base_url.trim().trim_end_matches('/').to_string();
    if base_url.is_empty() {
        return Err(ConfigError::Invalid("api.base_url must not be empty".into()));
    }
    if !(0.0..1.0).contains(&parsed.retry.jitter) {
        return Err(ConfigError::Invalid(format!(
            "retry.jitter must be in [0, 1), got {}",
            parsed.retry.jitter
        )));
    }

    let mut config = Config {
        api: parsed.api,
        scheduler: parsed.scheduler.into(),
        retry: parsed.retry,
        cache: parsed.cache,
        auth: parsed.auth,
        display: parsed.display,
    };
    config.api.base_url = base_url;
    config.api.timeout_secs = config.api.timeout_secs.max(1);
    config.retry.base_delay_ms = config.retry.base_delay_ms.max(1);
    config.retry.max_multiplier = config.retry.max_multiplier.max(1);
    Ok(config)
}
