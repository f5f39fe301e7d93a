//! Glue between entity fields and [`crate::crypto`].
//!
//! Sensitive fields go through [`seal`] on every write path and [`open`] on
//! every read path. Columns come in pairs: `<field>_ciphertext` holds base64
//! ciphertext, `<field>_meta` holds the JSON [`crate::crypto::EncryptionMeta`].

use crate::crypto::{self, DerivedKey, EncryptedData};
use crate::db::conversion_error;
use crate::error::{StoreError, StoreResult};

pub(crate) fn seal(field: &str, plaintext: &str, key: &DerivedKey) -> StoreResult<EncryptedData> {
    crypto::encrypt(plaintext.as_bytes(), key)
        .map_err(|e| StoreError::Encryption(format!("{field}: {e}")))
}

pub(crate) fn open(field: &str, data: &EncryptedData, key: &DerivedKey) -> StoreResult<String> {
    crypto::decrypt_string(data, key).map_err(|e| StoreError::Decryption(format!("{field}: {e}")))
}

/// Column values for one sealed field.
pub(crate) fn to_columns(data: &EncryptedData) -> StoreResult<(String, String)> {
    let meta = data
        .meta_json()
        .map_err(|e| StoreError::Encryption(e.to_string()))?;
    Ok((data.ciphertext_base64(), meta))
}

/// Same as [`to_columns`] for optional fields.
pub(crate) fn to_optional_columns(
    data: Option<&EncryptedData>,
) -> StoreResult<(Option<String>, Option<String>)> {
    match data {
        Some(d) => to_columns(d).map(|(c, m)| (Some(c), Some(m))),
        None => Ok((None, None)),
    }
}

pub(crate) fn sealed_column(
    row: &rusqlite::Row<'_>,
    ciphertext_idx: usize,
    meta_idx: usize,
) -> rusqlite::Result<EncryptedData> {
    let ciphertext: String = row.get(ciphertext_idx)?;
    let meta: String = row.get(meta_idx)?;
    EncryptedData::from_columns(&ciphertext, &meta).map_err(|e| conversion_error(ciphertext_idx, e))
}

pub(crate) fn optional_sealed_column(
    row: &rusqlite::Row<'_>,
    ciphertext_idx: usize,
    meta_idx: usize,
) -> rusqlite::Result<Option<EncryptedData>> {
    let ciphertext: Option<String> = row.get(ciphertext_idx)?;
    let meta: Option<String> = row.get(meta_idx)?;
    match (ciphertext, meta) {
        (Some(c), Some(m)) => EncryptedData::from_columns(&c, &m)
            .map(Some)
            .map_err(|e| conversion_error(ciphertext_idx, e)),
        _ => Ok(None),
    }
}
