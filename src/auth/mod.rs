//! Token storage and JWT helpers.
//!
//! Tokens live behind a [`KeyValueStore`]: in memory for tests and
//! ephemeral sessions, or encrypted on disk under `~/.config/todo/tokens.json`.

mod crypto;
mod jwt;
mod store;
mod tokens;
mod types;

pub use crypto::KdfParams;
pub use jwt::{decode_claims, is_valid_at, Claims};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use tokens::TokenStore;
pub use types::{RefreshUpdate, TokenKind, TokenPair};

use crate::config::{default_token_store_path, AuthConfig, TokenStoreKind};
use crate::error::StoreError;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured token store backend.
pub fn token_store_from_config(config: &AuthConfig) -> Result<TokenStore, StoreError> {
    let backend: Arc<dyn KeyValueStore> = match config.token_store {
        TokenStoreKind::Memory => Arc::new(MemoryStore::new()),
        TokenStoreKind::File => {
            let path = config
                .token_store_path
                .clone()
                .or_else(default_token_store_path)
                .ok_or_else(|| {
                    StoreError::Unavailable(
                        "unable to resolve config root for token storage".to_string(),
                    )
                })?;
            let store = FileStore::new(path);
            if let Err(err) = store.preload() {
                tracing::warn!(error = %err, "stored session could not be read");
            }
            Arc::new(store)
        }
    };
    Ok(TokenStore::new(
        backend,
        Duration::from_secs(config.expiry_buffer_secs),
    ))
}
