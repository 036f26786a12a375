//! Config-file source discovery.
//!
//! Source order: explicit path > local file > global file > built-in defaults.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::ConfigDiagnostics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ConfigSource {
    /// Config loaded from explicit `--config` path.
    Explicit(PathBuf),
    /// Config loaded from local `./todo.toml`.
    Local,
    /// Config loaded from `<config root>/todo/todo.toml`.
    Global(PathBuf),
    /// No file found; runtime defaults were used.
    BuiltInDefaults,
}

/// Read config text from the highest-precedence available source.
pub(super) fn read_config_text_with_sources<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    // An explicit path must exist; silently falling back would hide typos.
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, ConfigSource::Explicit(path)));
    }

    if let Ok(text) = read_file(Path::new("todo.toml")) {
        return Ok((text, ConfigSource::Local));
    }
    if let Some(dir) = config_root() {
        let global = dir.join("todo").join("todo.toml");
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }

    Ok((String::new(), ConfigSource::BuiltInDefaults))
}

/// Warn when the config shadows a global file the user may expect to apply.
pub(super) fn collect_source_warnings<FRoot>(
    source: &ConfigSource,
    config_root: &FRoot,
    diagnostics: &mut ConfigDiagnostics,
) where
    FRoot: Fn() -> Option<PathBuf>,
{
    if *source != ConfigSource::Local {
        return;
    }
    let Some(global) = config_root().map(|dir| dir.join("todo").join("todo.toml")) else {
        return;
    };
    if global.exists() {
        diagnostics.warnings.push(format!(
            "Using local `./todo.toml`; global config `{}` is ignored.",
            global.display()
        ));
    }
}
