//! CLI `init` command: create the journal database and set the passphrase.

use anyhow::{bail, Context, Result};

use lifelog::config::LifelogConfig;
use lifelog::db;

use super::read_passphrase;

pub async fn init(config: &LifelogConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let app = super::open_app(config).await?;

    let health = app.store().health().await.context("failed to read database state")?;
    if health.vault_initialized {
        println!("Journal already initialized at {}", db_path.display());
        println!("Use `lifelog rekey` to change the passphrase.");
        return Ok(());
    }

    let passphrase = read_passphrase("New passphrase: ")?;
    if std::env::var(super::PASSPHRASE_ENV).is_err() {
        let confirm = read_passphrase("Repeat passphrase: ")?;
        if *confirm != *passphrase {
            bail!("passphrases do not match");
        }
    }
    app.unlock(&passphrase).await.context("failed to set up encryption")?;

    let questions = app.store().questions(None).await?;
    println!("Journal initialized at {}", db_path.display());
    println!("  Schema version:  {}", db::migrations::CURRENT_SCHEMA_VERSION);
    println!("  Questions:       {}", questions.len());
    println!(
        "  Sync:            {}",
        if app.sync_configured() { "configured" } else { "local only" }
    );
    Ok(())
}
