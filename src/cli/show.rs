//! CLI `show` command: decrypt and display one recording or journal entry.

use anyhow::{bail, Result};

use lifelog::config::LifelogConfig;

use super::preview;

pub async fn show(config: &LifelogConfig, id: &str) -> Result<()> {
    let app = super::open_unlocked(config).await?;
    let store = app.store();

    if let Some(r) = store.get_recording(id).await? {
        println!("Recording: {}", r.id);
        println!("{}", "=".repeat(50));
        println!("  Media:          {}", r.media_type);
        println!("  Privacy:        {}", r.privacy);
        if let Some(ref qid) = r.question_id {
            let question = store.resolve_question(qid).await?;
            let category = question
                .category()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".into());
            println!("  Question:       {} [{category}]", preview(question.prompt(), 60));
        }
        if let Some(secs) = r.duration_secs {
            println!("  Duration:       {secs:.1}s");
        }
        println!("  Created:        {}", r.created_at);
        println!("  Updated:        {}", r.updated_at);
        println!();
        println!("Content:");
        println!("  {}", r.content);
        if let Some(ref t) = r.transcription {
            println!();
            println!("Transcription:");
            println!("  {t}");
        }
        return Ok(());
    }

    if let Some(e) = store.get_entry(id).await? {
        println!("Journal entry: {}", e.id);
        println!("{}", "=".repeat(50));
        println!("  Date:           {}", e.entry_date);
        println!("  Privacy:        {}", e.privacy);
        if let Some(ref mood) = e.mood {
            println!("  Mood:           {mood}");
        }
        if !e.tags.is_empty() {
            println!("  Tags:           {}", e.tags.join(", "));
        }
        println!("  Created:        {}", e.created_at);
        println!();
        println!("{}", e.body);
        return Ok(());
    }

    bail!("no recording or journal entry with id {id}")
}
