//! CLI `rekey` command: change the passphrase and re-encrypt everything.
//!
//! If an earlier run was interrupted, the command instead finishes that run
//! using the previous passphrase.

use anyhow::{bail, Context, Result};

use lifelog::config::LifelogConfig;
use lifelog::store::ReencryptReport;

use super::read_passphrase;

pub async fn rekey(config: &LifelogConfig) -> Result<()> {
    let app = super::open_unlocked(config).await?;
    let store = app.store();

    let pending = store.pending_reencryption().await?;
    if pending > 0 {
        println!("{pending} rows are still sealed under a previous passphrase.");
        let old_passphrase = read_passphrase("Previous passphrase: ")?;
        let report = store
            .reencrypt_with_passphrase(&old_passphrase)
            .await
            .context("failed to resume re-encryption")?;
        print_report(&report);
        return Ok(());
    }

    let new_passphrase = read_passphrase("New passphrase: ")?;
    let confirm = read_passphrase("Repeat new passphrase: ")?;
    if *confirm != *new_passphrase {
        bail!("passphrases do not match");
    }

    let old_key = store
        .change_passphrase(&new_passphrase)
        .await
        .context("failed to change passphrase")?;

    println!("Re-encrypting journal...");
    let report = store
        .reencrypt_all(old_key)
        .await
        .context("re-encryption stopped; run `lifelog rekey` again with the new passphrase to resume")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ReencryptReport) {
    println!(
        "Re-encrypted {} recordings and {} journal entries.",
        report.recordings, report.entries
    );
    if !report.is_complete() {
        println!(
            "{} rows could not be opened with the previous passphrase:",
            report.failed.len()
        );
        for id in &report.failed {
            println!("  {id}");
        }
        println!("Run `lifelog rekey` again and enter the passphrase they were written with.");
    }
}
