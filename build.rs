//! Embeds commit hash and build time for `todo --version`.
//!
//! Both values can be pinned through `TODO_BUILD_GIT_HASH` and
//! `TODO_BUILD_TIMESTAMP` (for reproducible packaging); otherwise they are
//! probed from git and the clock, falling back to "unknown".

use std::env;
use std::fs;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const HASH_VAR: &str = "TODO_BUILD_GIT_HASH";
const TIMESTAMP_VAR: &str = "TODO_BUILD_TIMESTAMP";

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    watch_branch_ref();
    for var in [HASH_VAR, TIMESTAMP_VAR] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    let hash = env::var(HASH_VAR)
        .ok()
        .or_else(|| capture("git", &["rev-parse", "--short=12", "HEAD"]))
        .unwrap_or_else(|| "unknown".to_string());
    let timestamp = env::var(TIMESTAMP_VAR).unwrap_or_else(|_| utc_timestamp());

    println!("cargo:rustc-env={HASH_VAR}={hash}");
    println!("cargo:rustc-env={TIMESTAMP_VAR}={timestamp}");
}

/// Rebuild when the checked-out branch moves.
fn watch_branch_ref() {
    let Ok(head) = fs::read_to_string(".git/HEAD") else {
        return;
    };
    if let Some(reference) = head.trim().strip_prefix("ref: ") {
        println!("cargo:rerun-if-changed=.git/{reference}");
    }
}

fn utc_timestamp() -> String {
    capture("date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"]).unwrap_or_else(|| {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        format!("unix:{secs}")
    })
}

fn capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
