//! Input checks and failure logging shared by the domain façades.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, warn};

use crate::auth::TokenStore;
use crate::error::ApiError;

/// Remembers which session a façade's caches were filled under.
#[derive(Debug)]
pub(super) struct SessionScope {
    seen: AtomicU64,
}

impl SessionScope {
    pub(super) fn new(tokens: &TokenStore) -> Self {
        Self {
            seen: AtomicU64::new(tokens.session_epoch()),
        }
    }

    /// True once for each session change since the previous call.
    pub(super) fn moved(&self, tokens: &TokenStore) -> bool {
        let current = tokens.session_epoch();
        let moved = self.seen.swap(current, Ordering::AcqRel) != current;
        if moved {
            debug!(epoch = current, "session changed, dropping cached reads");
        }
        moved
    }
}

/// Reject blank required text fields.
pub(super) fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

/// Reject identifiers that are blank or cannot be a single path segment.
pub(super) fn require_id<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let id = require_text(value, field)?;
    if id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
    {
        return Err(ApiError::validation(format!("{field} is not a valid identifier")));
    }
    Ok(id)
}

pub(super) fn require_ids(ids: &[String]) -> Result<Vec<String>, ApiError> {
    if ids.is_empty() {
        return Err(ApiError::validation("at least one task id is required"));
    }
    ids.iter()
        .map(|id| require_id(id, "task id").map(str::to_string))
        .collect()
}

/// Log a façade failure and hand it back for propagation.
pub(super) fn logged(operation: &'static str, err: ApiError) -> ApiError {
    match &err {
        ApiError::Validation(_) => {}
        ApiError::Authentication(_) | ApiError::RateLimit { .. } => {
            warn!(operation, error = %err, "request rejected");
        }
        ApiError::Network { .. } | ApiError::Status { .. } => {
            error!(operation, error = %err, "request failed");
        }
    }
    err
}
