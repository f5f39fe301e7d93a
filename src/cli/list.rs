//! CLI `list` command. Reads plaintext summaries only, so no passphrase is needed.

use anyhow::Result;

use lifelog::config::LifelogConfig;
use lifelog::store::types::{MediaType, QuestionCategory};

pub struct ListArgs {
    pub entries: bool,
    pub category: Option<QuestionCategory>,
    pub media: Option<MediaType>,
    pub question: Option<String>,
    pub tag: Option<String>,
    pub limit: usize,
}

pub async fn list(config: &LifelogConfig, args: ListArgs) -> Result<()> {
    let app = super::open_app(config).await?;
    let state = app.state().get_state();

    if args.entries {
        let entries: Vec<_> = state
            .entries
            .iter()
            .filter(|e| args.tag.as_ref().map_or(true, |t| e.tags.contains(t)))
            .take(args.limit)
            .collect();
        if entries.is_empty() {
            println!("No journal entries.");
            return Ok(());
        }
        println!("{:<38} {:<12} {:<12} TAGS", "ID", "DATE", "MOOD");
        for e in entries {
            println!(
                "{:<38} {:<12} {:<12} {}",
                e.id,
                e.entry_date.to_string(),
                e.mood.as_deref().unwrap_or("-"),
                e.tags.join(",")
            );
        }
        return Ok(());
    }

    let recordings: Vec<_> = state
        .recordings
        .iter()
        .filter(|r| args.category.map_or(true, |c| r.category == Some(c)))
        .filter(|r| args.media.map_or(true, |m| r.media_type == m))
        .filter(|r| {
            args.question
                .as_ref()
                .map_or(true, |q| r.question_id.as_ref() == Some(q))
        })
        .take(args.limit)
        .collect();
    if recordings.is_empty() {
        println!("No recordings.");
        return Ok(());
    }

    println!(
        "{:<38} {:<6} {:<8} {:<14} {:<5} CREATED",
        "ID", "MEDIA", "PRIVACY", "CATEGORY", "TEXT"
    );
    for r in recordings {
        let category = r.category.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:<38} {:<6} {:<8} {:<14} {:<5} {}",
            r.id,
            r.media_type.as_str(),
            r.privacy.as_str(),
            category,
            if r.has_transcription { "yes" } else { "no" },
            r.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!(
        "{} recordings, {} questions answered",
        state.progress.recording_count,
        state.progress.answered_questions.len()
    );
    Ok(())
}
