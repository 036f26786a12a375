//! Persistent key-value backends for token storage.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::runtime::RuntimeFlavor;

use super::crypto::{
    decrypt_entries, encrypt_entries, looks_encrypted, EncryptedTokenFile, FileKey, KdfParams,
};
use crate::error::StoreError;

/// Minimal string key-value persistence used by [`super::TokenStore`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store; contents vanish when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Legacy/plaintext on-disk shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlainTokenFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// What the token file held when it was read.
pub(crate) enum OnDisk {
    Missing,
    Plain(BTreeMap<String, String>),
    Encrypted(EncryptedTokenFile),
}

/// Encrypted JSON file store.
///
/// The file is read and its key derived once; after that the decrypted
/// entries are served from memory and every mutation is written through.
/// Disk work and key derivation run via `block_in_place` when called from a
/// multi-threaded tokio runtime.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    params: KdfParams,
    state: Mutex<FileState>,
    derivations: AtomicUsize,
}

#[derive(Debug, Default)]
struct FileState {
    loaded: bool,
    entries: BTreeMap<String, String>,
    key: Option<FileKey>,
    // Set when the file cannot be decoded; cleared by the next write.
    unreadable: Option<String>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_params(path, KdfParams::default())
    }

    pub fn with_params(path: impl Into<PathBuf>, params: KdfParams) -> Self {
        Self {
            path: path.into(),
            params,
            state: Mutex::new(FileState::default()),
            derivations: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file now rather than on first access.
    pub fn preload(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        self.ensure_loaded(&mut state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, FileState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("token file lock poisoned".into()))
    }

    fn ensure_loaded(&self, state: &mut FileState) -> Result<(), StoreError> {
        if let Some(reason) = &state.unreadable {
            return Err(StoreError::Corrupt(reason.clone()));
        }
        if state.loaded {
            return Ok(());
        }
        match off_reactor(|| self.load(state)) {
            Ok(()) => {
                state.loaded = true;
                Ok(())
            }
            Err(StoreError::Corrupt(reason)) => {
                state.unreadable = Some(reason.clone());
                Err(StoreError::Corrupt(reason))
            }
            Err(err) => Err(err),
        }
    }

    fn load(&self, state: &mut FileState) -> Result<(), StoreError> {
        match read_token_file(&self.path)? {
            OnDisk::Missing => {}
            OnDisk::Encrypted(file) => {
                let key = self.derive(|| FileKey::for_file(&file, self.params))?;
                state.entries = decrypt_entries(&file, &key)?;
                state.key = Some(key);
            }
            OnDisk::Plain(entries) => {
                state.entries = entries;
                if !state.entries.is_empty() {
                    // Best-effort migration; keep serving plaintext if the rewrite fails.
                    if let Err(err) = self.persist(state) {
                        tracing::warn!(path = %self.path.display(), error = %err, "failed to encrypt legacy token file");
                    }
                }
            }
        }
        Ok(())
    }

    fn derive(
        &self,
        derive: impl FnOnce() -> Result<FileKey, StoreError>,
    ) -> Result<FileKey, StoreError> {
        self.derivations.fetch_add(1, Ordering::Relaxed);
        derive()
    }

    fn persist(&self, state: &mut FileState) -> Result<(), StoreError> {
        let key = match state.key.take() {
            Some(key) => key,
            None => self.derive(|| FileKey::generate(self.params))?,
        };
        let outcome = encrypt_entries(&state.entries, &key)
            .and_then(|file| write_token_file(&self.path, &file));
        state.key = Some(key);
        outcome
    }

    fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let mut state = self.lock()?;
        match self.ensure_loaded(&mut state) {
            Ok(()) => {}
            Err(StoreError::Corrupt(reason)) => {
                tracing::warn!(path = %self.path.display(), reason = %reason, "replacing unreadable token file");
                *state = FileState {
                    loaded: true,
                    ..FileState::default()
                };
            }
            Err(err) => return Err(err),
        }

        let previous = state.entries.clone();
        if !mutate(&mut state.entries) {
            return Ok(());
        }
        let state = &mut *state;
        if let Err(err) = off_reactor(|| self.persist(state)) {
            state.entries = previous;
            return Err(err);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn key_derivations(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.lock()?;
        self.ensure_loaded(&mut state)?;
        Ok(state.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.remove(key).is_some())
    }
}

/// Run blocking file or KDF work without stalling a multi-threaded runtime.
fn off_reactor<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

/// Read and classify the token file without decrypting it.
pub(crate) fn read_token_file(path: &Path) -> Result<OnDisk, StoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(OnDisk::Missing),
        Err(err) => return Err(StoreError::Io(err)),
    };
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|err| {
        StoreError::Corrupt(format!(
            "failed to parse token file `{}`: {err}",
            path.display()
        ))
    })?;

    if looks_encrypted(&value) {
        let encrypted: EncryptedTokenFile = serde_json::from_value(value).map_err(|err| {
            StoreError::Corrupt(format!(
                "failed to parse encrypted token file `{}`: {err}",
                path.display()
            ))
        })?;
        return Ok(OnDisk::Encrypted(encrypted));
    }

    let parsed: PlainTokenFile = serde_json::from_value(value).map_err(|err| {
        StoreError::Corrupt(format!(
            "failed to parse token file `{}`: {err}",
            path.display()
        ))
    })?;
    Ok(OnDisk::Plain(parsed.entries))
}

/// Persist an encrypted token file with restrictive permissions.
fn write_token_file(path: &Path, file: &EncryptedTokenFile) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
        }
    }

    let text = serde_json::to_string_pretty(file).map_err(|err| {
        StoreError::Corrupt(format!("failed to serialize encrypted token file: {err}"))
    })?;
    let mut options = std::fs::OpenOptions::new();
    options.create(true).truncate(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut out = options.open(path)?;
    out.write_all(text.as_bytes())?;
    out.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}
