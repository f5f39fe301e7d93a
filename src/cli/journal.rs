//! CLI commands that write to the journal: `record`, `write`, `transcribe`, `delete`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use lifelog::config::LifelogConfig;
use lifelog::store::types::{JournalEntry, MediaType, PrivacyLevel};

pub struct RecordArgs {
    pub content: String,
    pub media: MediaType,
    pub question: Option<String>,
    pub privacy: Option<PrivacyLevel>,
    pub duration: Option<f64>,
}

/// Capture a recording, optionally answering a catalog question.
pub async fn record(config: &LifelogConfig, args: RecordArgs) -> Result<()> {
    let app = super::open_unlocked(config).await?;

    let mut recording = app.new_recording(args.media, args.content);
    if let Some(privacy) = args.privacy {
        recording = recording.with_privacy(privacy);
    }
    if let Some(secs) = args.duration {
        recording = recording.with_duration(secs);
    }
    if let Some(qid) = args.question {
        let question = app.resolve_question(&qid).await?;
        if question.category().is_none() {
            bail!("no question with id {qid:?} (see `lifelog questions`)");
        }
        println!("Answering: {}", question.prompt());
        recording = recording.answering(qid);
    }

    let id = app.save_recording(&recording).await?;
    println!("Saved recording {id}");
    Ok(())
}

pub struct WriteArgs {
    pub body: String,
    pub date: Option<NaiveDate>,
    pub mood: Option<String>,
    pub tags: Vec<String>,
    pub privacy: Option<PrivacyLevel>,
}

/// Add a dated journal entry (today by default).
pub async fn write(config: &LifelogConfig, args: WriteArgs) -> Result<()> {
    let app = super::open_unlocked(config).await?;

    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut entry = JournalEntry::new(date, args.body).with_tags(args.tags);
    entry.privacy = args
        .privacy
        .unwrap_or(app.state().get_state().settings.default_privacy);
    if let Some(mood) = args.mood {
        entry = entry.with_mood(mood);
    }

    let id = app.save_entry(&entry).await?;
    println!("Saved journal entry {id} for {date}");
    Ok(())
}

pub async fn transcribe(config: &LifelogConfig, id: &str, text: &str) -> Result<()> {
    let app = super::open_unlocked(config).await?;
    let recording = app
        .attach_transcription(id, text)
        .await
        .with_context(|| format!("failed to attach transcription to {id}"))?;
    println!(
        "Transcription attached to {} ({} chars)",
        recording.id,
        text.chars().count()
    );
    Ok(())
}

/// Delete a recording or journal entry. Deleting an unknown id is not an error.
pub async fn delete(config: &LifelogConfig, id: &str) -> Result<()> {
    let app = super::open_app(config).await?;
    if app.delete_recording(id).await? {
        println!("Deleted recording {id}");
    } else if app.delete_entry(id).await? {
        println!("Deleted journal entry {id}");
    } else {
        println!("Nothing to delete: {id} not found");
    }
    Ok(())
}
