use anyhow::Result;

use lifelog::app::{SkipReason, SyncOutcome};
use lifelog::config::LifelogConfig;

/// Run one sync pass against the configured backend.
pub async fn sync(config: &LifelogConfig) -> Result<()> {
    let app = super::open_app(config).await?;
    let pending = app.store().pending_count().await?;

    match app.sync_now().await? {
        SyncOutcome::Skipped(SkipReason::NotConfigured) => {
            println!("Sync is not configured (set LIFELOG_SYNC_URL or [sync] endpoint).");
            println!("{pending} local changes waiting.");
        }
        SyncOutcome::Skipped(SkipReason::Disabled) => {
            println!("Sync is turned off. Enable it with `lifelog settings set syncEnabled true`.");
        }
        SyncOutcome::Completed(report) => {
            println!("Sync complete at {}", report.synced_at.format("%Y-%m-%d %H:%M:%S"));
            println!("  Pushed:   {}", report.pushed);
            println!("  Applied:  {}", report.applied);
            println!("  Skipped:  {}", report.skipped);
            if report.vault_adopted {
                println!("The passphrase was changed on another device; unlock with the new one.");
            }
        }
        SyncOutcome::Offline(reason) => {
            println!("Sync backend unavailable: {reason}");
            println!("{pending} local changes kept for the next attempt.");
        }
    }
    Ok(())
}
