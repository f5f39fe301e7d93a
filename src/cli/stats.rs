use anyhow::Result;

use lifelog::config::LifelogConfig;

use super::format_bytes;

/// Display journal statistics in the terminal.
pub async fn stats(config: &LifelogConfig) -> Result<()> {
    let app = super::open_app(config).await?;
    let response = app.store().stats().await?;

    println!("Journal Statistics");
    println!("{}", "=".repeat(40));
    println!("  Recordings:          {}", response.total_recordings);
    println!("  Transcribed:         {}", response.transcribed_recordings);
    println!("  Journal entries:     {}", response.journal_entries);
    println!(
        "  Questions answered:  {} of {}",
        response.answered_questions, response.questions
    );
    println!();

    println!("By Media Type:");
    for (media, count) in &response.by_media_type {
        println!("  {:<14} {}", media, count);
    }
    println!();

    println!("By Category:");
    for (category, count) in &response.by_category {
        println!("  {:<14} {}", category, count);
    }
    println!();

    println!("Pending sync:          {}", response.pending_sync);
    println!("Database size:         {}", format_bytes(response.db_size_bytes));

    if let Some(ref oldest) = response.oldest_recording {
        println!("Oldest recording:      {oldest}");
    }
    if let Some(ref newest) = response.newest_recording {
        println!("Newest recording:      {newest}");
    }

    Ok(())
}
