//! Binary-local command orchestration.
//!
//! `entry` resolves config and builds the client; `commands` holds one
//! handler per subcommand group.

pub(crate) mod commands;
pub(crate) mod entry;
