//! Encryption at rest for the token file.
//!
//! Entries are sealed with a random per-write data key. That key is sealed
//! in turn with a key-encryption key stretched (scrypt) from host identity
//! material and a random salt, so a copied token file is useless elsewhere.

use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use scrypt::Params as ScryptParams;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::StoreError;

const FORMAT_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const KEK_CONTEXT: &[u8] = b"todo-client/token-kek/v1";
const MACHINE_ID_PATHS: [&str; 3] = ["/etc/machine-id", "/var/lib/dbus/machine-id", "/etc/hostid"];

/// On-disk layout of an encrypted token file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EncryptedTokenFile {
    pub(crate) version: u32,
    pub(crate) encryption: KeyEnvelope,
    pub(crate) entries: BTreeMap<String, Sealed>,
}

/// Salt for the key-encryption key plus the sealed data key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct KeyEnvelope {
    pub(crate) salt: String,
    pub(crate) data_key: Sealed,
}

/// Base64 nonce and ciphertext of one sealed value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Sealed {
    pub(crate) nonce: String,
    pub(crate) ciphertext: String,
}

/// scrypt cost parameters for the key-encryption key.
///
/// The default is scrypt's recommended interactive cost. Files written with
/// one set of parameters can only be read back with the same set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: ScryptParams::RECOMMENDED_LOG_N,
            r: ScryptParams::RECOMMENDED_R,
            p: ScryptParams::RECOMMENDED_P,
        }
    }
}

impl KdfParams {
    fn scrypt(self) -> Result<ScryptParams, StoreError> {
        ScryptParams::new(self.log_n, self.r, self.p, KEY_LEN)
            .map_err(|err| StoreError::Unavailable(format!("invalid scrypt parameters: {err}")))
    }
}

struct SecretKey([u8; KEY_LEN]);

/// Salt plus the key-encryption key stretched from it.
///
/// Deriving is the expensive step, so a store derives once and reuses the
/// result for every later write of the same file.
pub(crate) struct FileKey {
    salt: [u8; SALT_LEN],
    kek: SecretKey,
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKey").finish_non_exhaustive()
    }
}

impl FileKey {
    /// Fresh random salt, for a file that has no key yet.
    pub(crate) fn generate(params: KdfParams) -> Result<Self, StoreError> {
        Self::derive(random_bytes(), params)
    }

    /// The key an existing encrypted file was written with.
    pub(crate) fn for_file(file: &EncryptedTokenFile, params: KdfParams) -> Result<Self, StoreError> {
        Self::derive(decode_array(&file.encryption.salt, "salt")?, params)
    }

    fn derive(salt: [u8; SALT_LEN], params: KdfParams) -> Result<Self, StoreError> {
        Ok(Self {
            kek: SecretKey::for_machine(&salt, params)?,
            salt,
        })
    }
}

impl SecretKey {
    fn random() -> Self {
        Self(random_bytes())
    }

    /// Key-encryption key for this machine and `salt`.
    fn for_machine(salt: &[u8; SALT_LEN], params: KdfParams) -> Result<Self, StoreError> {
        let seed = Sha256::new()
            .chain_update(KEK_CONTEXT)
            .chain_update(machine_identity())
            .chain_update(salt)
            .finalize();
        let mut key = [0u8; KEY_LEN];
        scrypt::scrypt(&seed, salt, &params.scrypt()?, &mut key)
            .map_err(|err| StoreError::Corrupt(format!("failed to derive machine key: {err}")))?;
        Ok(Self(key))
    }

    fn cipher(&self) -> Result<Aes256GcmSiv, StoreError> {
        Aes256GcmSiv::new_from_slice(&self.0)
            .map_err(|_| StoreError::Corrupt("invalid encryption key length".to_string()))
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Sealed, StoreError> {
        let nonce: [u8; NONCE_LEN] = random_bytes();
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| StoreError::Corrupt("failed to encrypt token data".to_string()))?;
        Ok(Sealed {
            nonce: B64.encode(nonce),
            ciphertext: B64.encode(ciphertext),
        })
    }

    /// `None` when authentication fails (wrong key or tampered data).
    fn open(&self, sealed: &Sealed, what: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let nonce: [u8; NONCE_LEN] = decode_array(&sealed.nonce, what)?;
        let ciphertext = decode(&sealed.ciphertext, what)?;
        Ok(self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .ok())
    }
}

pub(crate) fn looks_encrypted(value: &serde_json::Value) -> bool {
    value.get("encryption").is_some_and(serde_json::Value::is_object)
}

pub(crate) fn encrypt_entries(
    entries: &BTreeMap<String, String>,
    key: &FileKey,
) -> Result<EncryptedTokenFile, StoreError> {
    let data_key = SecretKey::random();
    let sealed = entries
        .iter()
        .map(|(name, value)| Ok((name.clone(), data_key.seal(value.as_bytes())?)))
        .collect::<Result<BTreeMap<_, _>, StoreError>>()?;

    Ok(EncryptedTokenFile {
        version: FORMAT_VERSION,
        encryption: KeyEnvelope {
            salt: B64.encode(key.salt),
            data_key: key.kek.seal(&data_key.0)?,
        },
        entries: sealed,
    })
}

pub(crate) fn decrypt_entries(
    file: &EncryptedTokenFile,
    key: &FileKey,
) -> Result<BTreeMap<String, String>, StoreError> {
    let raw_key = key.kek.open(&file.encryption.data_key, "data_key")?.ok_or_else(|| {
        StoreError::Corrupt(
            "stored tokens cannot be decrypted on this machine; run `todo login` again"
                .to_string(),
        )
    })?;
    let data_key = SecretKey(raw_key.try_into().map_err(|_| {
        StoreError::Corrupt("token file holds malformed key material".to_string())
    })?);

    let mut entries = BTreeMap::new();
    for (name, sealed) in &file.entries {
        let plain = data_key
            .open(sealed, name)?
            .ok_or_else(|| StoreError::Corrupt(format!("stored entry `{name}` failed to decrypt")))?;
        let text = String::from_utf8(plain)
            .map_err(|_| StoreError::Corrupt(format!("stored entry `{name}` is not UTF-8")))?;
        entries.insert(name.clone(), text);
    }
    Ok(entries)
}

/// Host, user and machine-id material; stable across runs on one machine.
fn machine_identity() -> Vec<u8> {
    let host = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    let home = dirs::home_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let machine_id = MACHINE_ID_PATHS
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_default();
    [
        std::env::consts::OS,
        host.as_str(),
        user.as_str(),
        home.as_str(),
        machine_id.as_str(),
    ]
    .join("\u{1f}")
    .into_bytes()
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn decode(value: &str, field: &str) -> Result<Vec<u8>, StoreError> {
    B64.decode(value)
        .map_err(|err| StoreError::Corrupt(format!("token file field `{field}` is not base64: {err}")))
}

fn decode_array<const N: usize>(value: &str, field: &str) -> Result<[u8; N], StoreError> {
    let bytes = decode(value, field)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        StoreError::Corrupt(format!(
            "token file field `{field}` has length {len}, expected {N}"
        ))
    })
}
