mod cli;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lifelog::config::LifelogConfig;
use lifelog::store::types::{MediaType, PrivacyLevel, QuestionCategory};

#[derive(Parser)]
#[command(name = "lifelog", version, about = "Encrypted local-first life journal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Set the passphrase and create the journal database
    Init,
    /// Save a recording, optionally answering a question
    Record {
        /// Recording content (text, or a transcript-ready note)
        content: String,
        /// Media type: text, voice, photo or video
        #[arg(long, default_value = "text")]
        media: MediaType,
        /// Question id this recording answers
        #[arg(long)]
        question: Option<String>,
        /// Privacy level: private, trusted, family or public
        #[arg(long)]
        privacy: Option<PrivacyLevel>,
        /// Duration in seconds
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Write a journal entry
    Write {
        body: String,
        /// Entry date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        mood: Option<String>,
        /// Tag, may be repeated
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        privacy: Option<PrivacyLevel>,
    },
    /// Decrypt and print one recording or entry
    Show { id: String },
    /// List recordings (or entries with --entries)
    List {
        #[arg(long)]
        entries: bool,
        #[arg(long)]
        category: Option<QuestionCategory>,
        #[arg(long)]
        media: Option<MediaType>,
        #[arg(long)]
        question: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete a recording or entry by id
    Delete { id: String },
    /// Attach a transcription to a recording
    Transcribe { id: String, text: String },
    /// Show or change user settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
    /// Browse the question catalog
    Questions {
        #[arg(long)]
        category: Option<QuestionCategory>,
        /// Only questions without a recording
        #[arg(long)]
        unanswered: bool,
    },
    /// Push local changes and pull remote ones
    Sync,
    /// Change the passphrase and re-encrypt all content
    Rekey,
    /// Run database diagnostics
    Doctor,
    /// Show journal statistics
    Stats,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print current settings
    Show,
    /// Change one setting, e.g. `set syncEnabled false`
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LifelogConfig::load()?;

    // Log to stderr so command output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Init => cli::init::init(&config).await?,
        Command::Record {
            content,
            media,
            question,
            privacy,
            duration,
        } => {
            cli::journal::record(
                &config,
                cli::journal::RecordArgs {
                    content,
                    media,
                    question,
                    privacy,
                    duration,
                },
            )
            .await?
        }
        Command::Write {
            body,
            date,
            mood,
            tags,
            privacy,
        } => {
            cli::journal::write(
                &config,
                cli::journal::WriteArgs {
                    body,
                    date,
                    mood,
                    tags,
                    privacy,
                },
            )
            .await?
        }
        Command::Show { id } => cli::show::show(&config, &id).await?,
        Command::List {
            entries,
            category,
            media,
            question,
            tag,
            limit,
        } => {
            cli::list::list(
                &config,
                cli::list::ListArgs {
                    entries,
                    category,
                    media,
                    question,
                    tag,
                    limit,
                },
            )
            .await?
        }
        Command::Delete { id } => cli::journal::delete(&config, &id).await?,
        Command::Transcribe { id, text } => cli::journal::transcribe(&config, &id, &text).await?,
        Command::Settings { action } => match action.unwrap_or(SettingsAction::Show) {
            SettingsAction::Show => cli::settings::show(&config).await?,
            SettingsAction::Set { key, value } => cli::settings::set(&config, &key, &value).await?,
        },
        Command::Questions {
            category,
            unanswered,
        } => cli::questions::questions(&config, category, unanswered).await?,
        Command::Sync => cli::sync::sync(&config).await?,
        Command::Rekey => cli::rekey::rekey(&config).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Stats => cli::stats::stats(&config).await?,
    }

    Ok(())
}
