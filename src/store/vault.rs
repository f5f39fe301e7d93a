//! The vault record kept in `schema_meta`.
//!
//! The active vault lives under the KDF-params and key-check keys. After a
//! passphrase change the replaced one is kept under [`PREVIOUS_VAULT_KEY`]
//! until no row is sealed under it any more.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::crypto::VaultParams;
use crate::db::{format_timestamp, parse_timestamp};
use crate::db::migrations::{
    delete_meta, get_meta, set_meta, KDF_PARAMS_KEY, KEY_CHECK_KEY, PREVIOUS_VAULT_KEY,
    VAULT_UPDATED_AT_KEY,
};
use crate::error::StoreResult;

pub fn load_vault(conn: &Connection) -> StoreResult<Option<VaultParams>> {
    let (Some(kdf), Some(check)) = (get_meta(conn, KDF_PARAMS_KEY)?, get_meta(conn, KEY_CHECK_KEY)?)
    else {
        return Ok(None);
    };
    // Databases from before vault sync carry no timestamp; they lose every tie.
    let updated_at = get_meta(conn, VAULT_UPDATED_AT_KEY)?
        .and_then(|raw| parse_timestamp(&raw).ok())
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    Ok(Some(VaultParams {
        kdf: serde_json::from_str(&kdf)?,
        key_check: serde_json::from_str(&check)?,
        updated_at,
    }))
}

/// Make `vault` the active record. Run inside the caller's transaction.
pub fn save_vault(conn: &Connection, vault: &VaultParams) -> StoreResult<()> {
    set_meta(conn, KDF_PARAMS_KEY, &serde_json::to_string(&vault.kdf)?)?;
    set_meta(conn, KEY_CHECK_KEY, &serde_json::to_string(&vault.key_check)?)?;
    set_meta(conn, VAULT_UPDATED_AT_KEY, &format_timestamp(&vault.updated_at))?;
    Ok(())
}

/// Replace the active vault, keeping the old one as the previous vault
/// unless an earlier previous vault still has rows waiting.
pub fn replace_vault(conn: &Connection, next: &VaultParams) -> StoreResult<()> {
    if let Some(current) = load_vault(conn)? {
        if current.same_key_as(next) {
            return save_vault(conn, next);
        }
        if previous_vault(conn)?.is_none() || pending_reencryption(conn, &next.kdf.salt)? == 0 {
            set_meta(conn, PREVIOUS_VAULT_KEY, &serde_json::to_string(&current)?)?;
        }
    }
    save_vault(conn, next)
}

pub fn previous_vault(conn: &Connection) -> StoreResult<Option<VaultParams>> {
    get_meta(conn, PREVIOUS_VAULT_KEY)?
        .map(|json| serde_json::from_str(&json).map_err(Into::into))
        .transpose()
}

pub fn clear_previous_vault(conn: &Connection) -> StoreResult<()> {
    Ok(delete_meta(conn, PREVIOUS_VAULT_KEY)?)
}

/// Rows with at least one field sealed under a salt other than `salt`.
pub fn pending_reencryption(conn: &Connection, salt: &str) -> StoreResult<u64> {
    let (recordings, entries) = sealed_outside(conn, salt)?;
    Ok((recordings.len() + entries.len()) as u64)
}

/// Ids of recordings and entries with a field sealed under another salt.
pub fn sealed_outside(conn: &Connection, salt: &str) -> StoreResult<(Vec<String>, Vec<String>)> {
    let ids = |sql: &str| -> StoreResult<Vec<String>> {
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map(params![salt], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    };
    let recordings = ids(
        "SELECT id FROM recordings \
         WHERE json_extract(content_meta, '$.kdf.salt') != ?1 \
         OR (transcript_meta IS NOT NULL AND json_extract(transcript_meta, '$.kdf.salt') != ?1) \
         ORDER BY created_at, id",
    )?;
    let entries = ids(
        "SELECT id FROM journal_entries WHERE json_extract(body_meta, '$.kdf.salt') != ?1 \
         ORDER BY created_at, id",
    )?;
    Ok((recordings, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncryptionConfig;
    use crate::crypto::{DerivedKey, KdfParams};

    fn vault(passphrase: &str) -> VaultParams {
        let config = EncryptionConfig {
            argon2_memory_kib: 64,
            argon2_iterations: 1,
            argon2_parallelism: 1,
        };
        let key = DerivedKey::derive(passphrase, &KdfParams::generate(&config)).unwrap();
        VaultParams::seal(&key).unwrap()
    }

    #[test]
    fn fresh_database_has_no_vault() {
        let conn = crate::db::open_memory_database().unwrap();
        assert!(load_vault(&conn).unwrap().is_none());
        assert!(previous_vault(&conn).unwrap().is_none());
    }

    #[test]
    fn replacing_keeps_the_old_vault_as_previous() {
        let conn = crate::db::open_memory_database().unwrap();
        let (first, second) = (vault("one"), vault("two"));
        replace_vault(&conn, &first).unwrap();
        assert!(previous_vault(&conn).unwrap().is_none());

        replace_vault(&conn, &second).unwrap();
        assert_eq!(load_vault(&conn).unwrap(), Some(second));
        assert_eq!(previous_vault(&conn).unwrap(), Some(first));

        clear_previous_vault(&conn).unwrap();
        assert!(previous_vault(&conn).unwrap().is_none());
    }
}
