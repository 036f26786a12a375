//! Access/refresh token persistence and validity checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::jwt::{decode_claims, is_valid_at, unix_now_millis, Claims};
use super::store::KeyValueStore;
use super::types::{RefreshUpdate, TokenKind};
use crate::error::StoreError;

/// Persists the session's bearer tokens and answers validity questions.
///
/// Read and delete failures are logged and degrade to "no token". Writing the
/// access token is the one operation that reports failure: a silent failure
/// there would leave callers believing they are logged in.
///
/// The session epoch advances whenever the session may belong to someone
/// else: on login, on clear, and when a new access token names a different
/// subject. Anything cached per user should be dropped when it moves.
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
    expiry_buffer: Duration,
    epoch: AtomicU64,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, expiry_buffer: Duration) -> Self {
        Self {
            backend,
            expiry_buffer,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn get(&self, kind: TokenKind) -> Option<String> {
        match self.backend.get(kind.storage_key()) {
            Ok(value) => value.filter(|token| !token.trim().is_empty()),
            Err(err) => {
                tracing::warn!(token = ?kind, error = %err, "failed to read stored token");
                None
            }
        }
    }

    /// Store a new access token and apply `refresh` to the refresh token.
    pub fn set(&self, access: &str, refresh: RefreshUpdate) -> Result<(), StoreError> {
        let previous = self.get(TokenKind::Access).and_then(|token| subject_of(&token));
        self.write(access, refresh)?;
        if previous != subject_of(access) {
            self.advance_epoch();
        }
        Ok(())
    }

    /// Store the tokens of a freshly established session.
    pub fn start_session(&self, access: &str, refresh: RefreshUpdate) -> Result<(), StoreError> {
        let outcome = self.write(access, refresh);
        self.advance_epoch();
        outcome
    }

    /// Delete both tokens.
    pub fn clear(&self) {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            if let Err(err) = self.backend.remove(kind.storage_key()) {
                tracing::warn!(token = ?kind, error = %err, "failed to delete stored token");
            }
        }
        self.advance_epoch();
    }

    pub fn session_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn write(&self, access: &str, refresh: RefreshUpdate) -> Result<(), StoreError> {
        self.backend
            .set(TokenKind::Access.storage_key(), access)?;
        let key = TokenKind::Refresh.storage_key();
        let outcome = match refresh {
            RefreshUpdate::Keep => Ok(()),
            RefreshUpdate::Clear => self.backend.remove(key),
            RefreshUpdate::Replace(token) => self.backend.set(key, &token),
        };
        if let Err(err) = outcome {
            tracing::warn!(error = %err, "failed to persist refresh token");
        }
        Ok(())
    }

    /// True while the token's `exp` lies beyond now plus the expiry buffer.
    pub fn is_valid(&self, token: &str) -> bool {
        is_valid_at(token, unix_now_millis(), self.expiry_buffer.as_millis())
    }

    /// The stored access token, if one exists and is still usable.
    pub fn valid_access_token(&self) -> Option<String> {
        self.get(TokenKind::Access)
            .filter(|token| self.is_valid(token))
    }

    pub fn has_valid_access_token(&self) -> bool {
        self.valid_access_token().is_some()
    }

    /// Subject id of the stored access token (`id`, `sub`, then `userId`).
    pub fn user_id(&self) -> Option<String> {
        subject_of(&self.get(TokenKind::Access)?)
    }

    pub fn claims(&self, token: &str) -> Option<Claims> {
        decode_claims(token)
    }
}

fn subject_of(token: &str) -> Option<String> {
    decode_claims(token)?.subject()
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("expiry_buffer", &self.expiry_buffer)
            .field("epoch", &self.session_epoch())
            .finish_non_exhaustive()
    }
}
