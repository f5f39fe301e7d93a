//! CLI `settings` command: show or change user settings.

use anyhow::Result;

use lifelog::config::LifelogConfig;
use lifelog::store::types::Setting;

pub async fn show(config: &LifelogConfig) -> Result<()> {
    let app = super::open_app(config).await?;
    let state = app.state().get_state();
    let s = &state.settings;

    println!("Settings");
    println!("{}", "=".repeat(40));
    println!("  defaultPrivacy:      {}", s.default_privacy);
    let providers = if s.enabled_providers.is_empty() {
        "(none)".to_string()
    } else {
        s.enabled_providers.join(", ")
    };
    println!("  enabledProviders:    {providers}");
    println!("  syncEnabled:         {}", s.sync_enabled);
    println!("  autoTranscribe:      {}", s.auto_transcribe);
    println!("  dailyPromptEnabled:  {}", s.daily_prompt_enabled);
    if s.sync_enabled && !app.sync_configured() {
        println!();
        println!("Note: no sync endpoint configured (set LIFELOG_SYNC_URL).");
    }
    Ok(())
}

pub async fn set(config: &LifelogConfig, key: &str, value: &str) -> Result<()> {
    let setting = Setting::parse(key, value)?;
    let app = super::open_app(config).await?;
    app.set_setting(setting).await?;
    println!("Updated {key} = {value}");
    Ok(())
}
