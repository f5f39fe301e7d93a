//! Encryption at rest.
//!
//! AES-256-GCM for content, Argon2id for deriving the key from a passphrase.
//! Every [`EncryptedData`] carries its [`EncryptionMeta`] in the clear so the
//! derivation parameters can be inspected without decrypting anything.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::EncryptionConfig;

/// Cipher identifier recorded in every [`EncryptionMeta`].
pub const CIPHER_ALGORITHM: &str = "aes-256-gcm";
/// KDF identifier recorded in every [`KdfParams`].
pub const KDF_ALGORITHM: &str = "argon2id";

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const SALT_SIZE: usize = 16;
const TAG_SIZE: usize = 16;

/// Sealed into every [`VaultParams`] to recognise the right passphrase.
const KEY_CHECK_PLAINTEXT: &[u8] = b"lifelog key check v1";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: {0}")]
    Decrypt(String),
    #[error("invalid encrypted data: {0}")]
    InvalidData(String),
    #[error("encryption key not set")]
    KeyNotSet,
}

/// Argon2id parameters. Non-secret; stored next to every ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    /// Base64-encoded salt.
    pub salt: String,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Fresh parameters with a random salt.
    pub fn generate(config: &EncryptionConfig) -> Self {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self {
            algorithm: KDF_ALGORITHM.to_string(),
            salt: BASE64.encode(salt),
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }

    fn salt_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        BASE64
            .decode(&self.salt)
            .map_err(|e| CryptoError::InvalidData(format!("salt is not base64: {e}")))
    }
}

/// Everything needed to decrypt a ciphertext except the key itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionMeta {
    pub algorithm: String,
    /// Base64-encoded 96-bit nonce.
    pub nonce: String,
    pub kdf: KdfParams,
}

/// A ciphertext (with the GCM tag appended) plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    pub meta: EncryptionMeta,
}

impl EncryptedData {
    /// Base64 form of the ciphertext, as stored in `*_ciphertext` columns.
    pub fn ciphertext_base64(&self) -> String {
        BASE64.encode(&self.ciphertext)
    }

    /// JSON form of the metadata, as stored in `*_meta` columns.
    pub fn meta_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(&self.meta).map_err(|e| CryptoError::InvalidData(e.to_string()))
    }

    /// Rebuild from the two stored columns.
    pub fn from_columns(ciphertext_b64: &str, meta_json: &str) -> Result<Self, CryptoError> {
        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| CryptoError::InvalidData(format!("base64 decode failed: {e}")))?;
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::InvalidData("ciphertext too short".into()));
        }
        let meta: EncryptionMeta = serde_json::from_str(meta_json)
            .map_err(|e| CryptoError::InvalidData(format!("bad encryption meta: {e}")))?;
        Ok(Self { ciphertext, meta })
    }
}

/// A 256-bit content key together with the parameters it was derived from.
///
/// The key bytes are zeroed on drop and never printed.
pub struct DerivedKey {
    bytes: Zeroizing<[u8; KEY_SIZE]>,
    kdf: KdfParams,
}

impl DerivedKey {
    /// Derive a key from a passphrase with Argon2id. CPU- and memory-heavy;
    /// call from a blocking context.
    pub fn derive(passphrase: &str, kdf: &KdfParams) -> Result<Self, CryptoError> {
        if kdf.algorithm != KDF_ALGORITHM {
            return Err(CryptoError::KeyDerivation(format!(
                "unsupported kdf: {}",
                kdf.algorithm
            )));
        }
        let params = argon2::Params::new(
            kdf.memory_kib,
            kdf.iterations,
            kdf.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let salt = kdf.salt_bytes()?;
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        argon2
            .hash_password_into(passphrase.as_bytes(), &salt, key.as_mut())
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        Ok(Self {
            bytes: key,
            kdf: kdf.clone(),
        })
    }

    /// Wrap raw key material obtained from secure device storage.
    pub fn from_bytes(bytes: [u8; KEY_SIZE], kdf: KdfParams) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
            kdf,
        }
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"<redacted>")
            .field("kdf", &self.kdf)
            .finish()
    }
}

/// What a device needs to turn the passphrase into the journal key and
/// confirm it: the KDF parameters plus a sealed check value. Holds no secret,
/// so it travels through sync; every device sharing it derives the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultParams {
    pub kdf: KdfParams,
    pub key_check: EncryptedData,
    pub updated_at: DateTime<Utc>,
}

impl VaultParams {
    /// Seal a fresh check value under `key`.
    pub fn seal(key: &DerivedKey) -> Result<Self, CryptoError> {
        Ok(Self {
            kdf: key.kdf.clone(),
            key_check: encrypt(KEY_CHECK_PLAINTEXT, key)?,
            updated_at: Utc::now(),
        })
    }

    /// Derive the key for `passphrase` and verify it. Heavy; call from a blocking context.
    pub fn derive(&self, passphrase: &str) -> Result<DerivedKey, CryptoError> {
        let key = DerivedKey::derive(passphrase, &self.kdf)?;
        self.verify(&key)?;
        Ok(key)
    }

    pub fn verify(&self, key: &DerivedKey) -> Result<(), CryptoError> {
        let plaintext = Zeroizing::new(decrypt(&self.key_check, key)?);
        if plaintext.as_slice() != KEY_CHECK_PLAINTEXT {
            return Err(CryptoError::Decrypt("key check mismatch".into()));
        }
        Ok(())
    }

    /// Two records describe the same key when they share KDF parameters.
    pub fn same_key_as(&self, other: &VaultParams) -> bool {
        self.kdf == other.kdf
    }
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> Result<EncryptedData, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.bytes.as_ref())
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    Ok(EncryptedData {
        ciphertext,
        meta: EncryptionMeta {
            algorithm: CIPHER_ALGORITHM.to_string(),
            nonce: BASE64.encode(nonce_bytes),
            kdf: key.kdf.clone(),
        },
    })
}

/// Decrypt and authenticate. A wrong key is always an error, never garbage output.
pub fn decrypt(data: &EncryptedData, key: &DerivedKey) -> Result<Vec<u8>, CryptoError> {
    if data.meta.algorithm != CIPHER_ALGORITHM {
        return Err(CryptoError::InvalidData(format!(
            "unsupported cipher: {}",
            data.meta.algorithm
        )));
    }
    if data.meta.kdf.salt != key.kdf.salt {
        return Err(CryptoError::Decrypt(
            "data was sealed with a different key".into(),
        ));
    }

    let nonce_bytes = BASE64
        .decode(&data.meta.nonce)
        .map_err(|e| CryptoError::InvalidData(format!("nonce is not base64: {e}")))?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidData(format!(
            "nonce must be {NONCE_SIZE} bytes, got {}",
            nonce_bytes.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.bytes.as_ref())
        .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), data.ciphertext.as_ref())
        .map_err(|_| CryptoError::Decrypt("authentication failed (wrong key or tampered data)".into()))
}

/// Decrypt to a UTF-8 string.
pub fn decrypt_string(data: &EncryptedData, key: &DerivedKey) -> Result<String, CryptoError> {
    let plaintext = Zeroizing::new(decrypt(data, key)?);
    String::from_utf8(plaintext.to_vec())
        .map_err(|e| CryptoError::Decrypt(format!("invalid UTF-8: {e}")))
}

/// Holds the session key in memory. Single writer (`set_key` / `lock`), many readers.
#[derive(Default)]
pub struct KeyManager {
    active: RwLock<Option<Arc<DerivedKey>>>,
}

impl KeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the session key, returning the previous one if any.
    pub fn set_key(&self, key: DerivedKey) -> Option<Arc<DerivedKey>> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.replace(Arc::new(key))
    }

    /// Forget the session key.
    pub fn lock(&self) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *active = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The active key, or [`CryptoError::KeyNotSet`].
    pub fn current(&self) -> Result<Arc<DerivedKey>, CryptoError> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CryptoError::KeyNotSet)
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
