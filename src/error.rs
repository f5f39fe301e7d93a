//! Error taxonomy for the storage and state layers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::sync::SyncError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed entity rejected before any write.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Key missing or cipher failure on the write path.
    #[error("encryption failed: {0}")]
    Encryption(String),
    /// Key missing, wrong, or data tampered on the read path.
    #[error("decryption failed: {0}")]
    Decryption(String),
    /// An operation that requires an existing row did not find one.
    #[error("{table} not found: {id}")]
    NotFound { table: &'static str, id: String },
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("background task failed: {0}")]
    Task(String),
}

/// Coarse error classes surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Encryption,
    Decryption,
    NotFound,
    Sync,
    Storage,
}

impl StoreError {
    pub(crate) fn encrypting(err: CryptoError) -> Self {
        Self::Encryption(err.to_string())
    }

    pub(crate) fn decrypting(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyNotSet => Self::Decryption("key unavailable (store is locked)".into()),
            other => Self::Decryption(other.to_string()),
        }
    }

    pub(crate) fn not_found(table: &'static str, id: &str) -> Self {
        Self::NotFound {
            table,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Encryption(_) => ErrorKind::Encryption,
            Self::Decryption(_) => ErrorKind::Decryption,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Sync(_) => ErrorKind::Sync,
            Self::Database(_) | Self::Serialization(_) | Self::Task(_) => ErrorKind::Storage,
        }
    }

    /// Whether the user can fix this (bad input, wrong or missing passphrase).
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Encryption | ErrorKind::Decryption
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_read_is_a_decryption_error() {
        let err = StoreError::decrypting(CryptoError::KeyNotSet);
        assert_eq!(err.kind(), ErrorKind::Decryption);
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn locked_write_is_an_encryption_error() {
        let err = StoreError::encrypting(CryptoError::KeyNotSet);
        assert_eq!(err.kind(), ErrorKind::Encryption);
        assert!(err.is_user_actionable());
    }

    #[test]
    fn storage_errors_are_not_user_actionable() {
        let err = StoreError::Task("join failed".into());
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(!err.is_user_actionable());
    }
}
