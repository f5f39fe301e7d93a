//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use lifelog::config::LifelogConfig;
use lifelog::crypto::{CIPHER_ALGORITHM, KDF_ALGORITHM};
use lifelog::db;

use super::format_bytes;

pub fn doctor(config: &LifelogConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `lifelog init` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Lifelog Health Report");
    println!("=====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Encryption:");
    let expected_suite = format!("{CIPHER_ALGORITHM}+{KDF_ALGORITHM}");
    match report.cipher_suite.as_deref() {
        Some(suite) if suite == expected_suite => println!("  Cipher suite:    {suite} (OK)"),
        Some(suite) => println!("  Cipher suite:    {suite} (WARNING: this build uses {expected_suite})"),
        None => println!("  Cipher suite:    (not recorded)"),
    }
    println!(
        "  Passphrase:      {}",
        if report.vault_initialized { "set" } else { "not set (run `lifelog init`)" }
    );
    if report.reencryption_pending {
        println!("  Re-encryption:   unfinished (run `lifelog rekey` with the previous passphrase)");
    }
    println!();
    println!("Row counts:");
    println!("  Questions:       {}", report.question_count);
    println!("  Recordings:      {}", report.recording_count);
    println!("  Journal entries: {}", report.entry_count);
    println!("  Pending sync:    {}", report.outbox_count);
    println!();
    println!(
        "Sync endpoint:     {}",
        config.sync.endpoint.as_deref().unwrap_or("(none, local only)")
    );
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Stop every running lifelog process.");
        println!("  2. Restore from a backup: cp backup.db {}", db_path.display());
    }

    Ok(())
}
