//! Compile-time build metadata exposed to CLI/runtime surfaces.

/// Semver package version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VCS commit hash captured at build time.
pub const GIT_COMMIT: &str = env!("TODO_BUILD_GIT_HASH");

/// Build timestamp captured at compile time.
pub const BUILD_TIMESTAMP: &str = env!("TODO_BUILD_TIMESTAMP");

/// Help trailer block that surfaces build metadata in `todo --help`.
pub const HELP_BUILD_METADATA: &str = concat!(
    "Build metadata:\n  commit: ",
    env!("TODO_BUILD_GIT_HASH"),
    "\n  built: ",
    env!("TODO_BUILD_TIMESTAMP")
);

/// Version block printed by `todo --version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("TODO_BUILD_GIT_HASH"),
    "\nbuilt: ",
    env!("TODO_BUILD_TIMESTAMP")
);
