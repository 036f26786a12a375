//! Per-user config locations and `todo init`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ConfigError;

use super::defaults::DEFAULT_CONFIG_TEMPLATE;
use super::GlobalConfigInitResult;

const APP_DIR: &str = "todo";
const CONFIG_FILE: &str = "todo.toml";
const TOKEN_FILE: &str = "tokens.json";

/// `<config root>/todo/todo.toml`.
pub fn default_global_config_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// `<config root>/todo/tokens.json`.
pub fn default_token_store_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join(TOKEN_FILE))
}

/// `$XDG_CONFIG_HOME` when set, else `~/.config`, else the platform config dir.
pub fn config_root_dir() -> Option<PathBuf> {
    let xdg = std::env::var("XDG_CONFIG_HOME").ok();
    match xdg.as_deref().map(str::trim) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir()
            .map(|home| home.join(".config"))
            .or_else(dirs::config_dir),
    }
}

fn app_dir() -> Option<PathBuf> {
    config_root_dir().map(|root| root.join(APP_DIR))
}

/// Write the bundled template to the per-user config path.
///
/// An existing file is left alone unless `force` is set, in which case it is
/// copied to a timestamped `.bak` sibling before being replaced.
pub fn initialize_default_global_config(
    force: bool,
) -> Result<GlobalConfigInitResult, ConfigError> {
    let path = default_global_config_path().ok_or_else(|| {
        ConfigError::Invalid("unable to resolve a config directory for todo".to_string())
    })?;
    initialize_default_global_config_at_path(&path, force)
}

pub(super) fn initialize_default_global_config_at_path(
    path: &Path,
    force: bool,
) -> Result<GlobalConfigInitResult, ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let path_buf = path.to_path_buf();

    if !path.exists() {
        return match create_new(path) {
            Ok(()) => Ok(GlobalConfigInitResult::Created { path: path_buf }),
            // Lost a race with another `todo init`; theirs is as good as ours.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Ok(GlobalConfigInitResult::AlreadyInitialized { path: path_buf })
            }
            Err(e) => Err(e.into()),
        };
    }
    if !force {
        return Ok(GlobalConfigInitResult::AlreadyInitialized { path: path_buf });
    }

    let backup_path = backup_path_for(path);
    fs::copy(path, &backup_path)?;
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    Ok(GlobalConfigInitResult::Overwritten {
        path: path_buf,
        backup_path,
    })
}

fn create_new(path: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(DEFAULT_CONFIG_TEMPLATE.as_bytes())
}

/// First unused `<name>.<unix secs>[.<n>].bak` next to `path`.
fn backup_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| CONFIG_FILE.to_string());
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    std::iter::once(format!("{name}.{stamp}.bak"))
        .chain((1..1000).map(|n| format!("{name}.{stamp}.{n}.bak")))
        .map(|candidate| path.with_file_name(candidate))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| {
            path.with_file_name(format!("{name}.{stamp}.{}.bak", std::process::id()))
        })
}
