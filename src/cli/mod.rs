pub mod doctor;
pub mod init;
pub mod journal;
pub mod list;
pub mod questions;
pub mod rekey;
pub mod settings;
pub mod show;
pub mod stats;
pub mod sync;

use anyhow::{bail, Context, Result};
use std::io::Write;
use zeroize::Zeroizing;

use lifelog::app::App;
use lifelog::config::LifelogConfig;

/// Environment variable read before prompting for the passphrase.
pub const PASSPHRASE_ENV: &str = "LIFELOG_PASSPHRASE";

/// Passphrase from `LIFELOG_PASSPHRASE`, or read from stdin.
pub fn read_passphrase(prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(val) = std::env::var(PASSPHRASE_ENV) {
        if !val.is_empty() {
            return Ok(Zeroizing::new(val));
        }
    }

    eprint!("{prompt}");
    std::io::stderr().flush()?;
    let mut input = Zeroizing::new(String::new());
    std::io::stdin()
        .read_line(&mut input)
        .context("failed to read passphrase")?;
    let trimmed = Zeroizing::new(input.trim_end_matches(['\r', '\n']).to_string());
    if trimmed.is_empty() {
        bail!("passphrase must not be empty");
    }
    Ok(trimmed)
}

/// Open the journal and load `AppState`. The store stays locked.
pub async fn open_app(config: &LifelogConfig) -> Result<App> {
    let app = App::open(config).await?;
    app.hydrate().await.context("failed to load journal state")?;
    Ok(app)
}

/// Open the journal and unlock it with the user's passphrase.
pub async fn open_unlocked(config: &LifelogConfig) -> Result<App> {
    let app = open_app(config).await?;
    let passphrase = read_passphrase("Passphrase: ")?;
    app.unlock(&passphrase)
        .await
        .context("failed to unlock journal")?;
    Ok(app)
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// First `max` characters of `text` on one line.
pub fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_cuts() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("two\n  lines", 20), "two lines");
        assert_eq!(preview("What was the house you grew up in like?", 12), "What was the...");
    }
}
