mod helpers;

use helpers::{fast_encryption, test_key};
use lifelog::app::App;
use lifelog::config::LifelogConfig;
use lifelog::db;
use lifelog::error::ErrorKind;
use lifelog::store::types::{MediaType, QuestionCategory, Recording};
use lifelog::store::LocalStore;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> LifelogConfig {
    let mut config = LifelogConfig::default();
    config.storage.db_path = dir.path().join("journal.db").to_string_lossy().into_owned();
    config.encryption = fast_encryption();
    config
}

#[tokio::test]
async fn data_survives_reopen_with_the_same_passphrase() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    {
        let store = LocalStore::open(&config).unwrap();
        assert!(!store.health().await.unwrap().vault_initialized);
        store.unlock("correct horse").await.unwrap();
        store
            .put_recording(&Recording::new(MediaType::Text, "kept").with_id("r1"))
            .await
            .unwrap();
    }

    let store = LocalStore::open(&config).unwrap();
    assert!(store.health().await.unwrap().vault_initialized);

    let err = store.unlock("wrong horse").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decryption);
    assert!(!store.is_unlocked());

    store.unlock("correct horse").await.unwrap();
    let back = store.get_recording("r1").await.unwrap().unwrap();
    assert_eq!(back.content, "kept");
}

#[tokio::test]
async fn ciphertext_on_disk_does_not_contain_plaintext() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let store = LocalStore::open(&config).unwrap();
    store.set_key(test_key(3));
    store
        .put_recording(&Recording::new(MediaType::Text, "needle in the haystack").with_id("r1"))
        .await
        .unwrap();

    let conn = db::open_database(config.resolved_db_path()).unwrap();
    let (ciphertext, meta): (String, String) = conn
        .query_row(
            "SELECT content_ciphertext, content_meta FROM recordings WHERE id = 'r1'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(!ciphertext.contains("needle"));
    let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
    assert_eq!(meta["algorithm"], "aes-256-gcm");
    assert_eq!(meta["kdf"]["algorithm"], "argon2id");
}

#[tokio::test]
async fn health_and_stats_on_a_fresh_journal() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let app = App::open(&config).await.unwrap();

    let health = app.store().health().await.unwrap();
    assert!(health.integrity_ok);
    assert_eq!(health.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert_eq!(health.cipher_suite.as_deref(), Some("aes-256-gcm+argon2id"));
    assert_eq!(health.question_count, 16);

    app.store().set_key(test_key(1));
    let r = Recording::new(MediaType::Voice, "file:///a.m4a")
        .with_id("v1")
        .answering("career-first-job");
    app.save_recording(&r).await.unwrap();
    app.attach_transcription("v1", "My first job was a paper route.")
        .await
        .unwrap();

    let stats = app.store().stats().await.unwrap();
    assert_eq!(stats.total_recordings, 1);
    assert_eq!(stats.transcribed_recordings, 1);
    assert_eq!(stats.answered_questions, 1);
    assert_eq!(stats.by_media_type.get("voice"), Some(&1));
}

#[tokio::test]
async fn extended_questions_are_merged_at_open() {
    let dir = TempDir::new().unwrap();
    let extra = dir.path().join("questions.toml");
    std::fs::write(
        &extra,
        r#"
[[questions]]
id = "dreams-island"
category = "dreams"
prompt = "If you could live on any island, which one?"

[[questions]]
id = "childhood-home"
category = "career"
prompt = "This duplicate is ignored."
"#,
    )
    .unwrap();

    let mut config = config_in(&dir);
    config.questions.extended_path = Some(extra.to_string_lossy().into_owned());
    let app = App::open(&config).await.unwrap();

    let dreams = app.store().questions(Some(QuestionCategory::Dreams)).await.unwrap();
    assert!(dreams.iter().any(|q| q.id == "dreams-island"));

    let home = app.store().question("childhood-home").await.unwrap().unwrap();
    assert_eq!(home.category, QuestionCategory::Childhood, "built-in wins");

    // Reopening does not duplicate anything.
    drop(app);
    let app = App::open(&config).await.unwrap();
    assert_eq!(app.store().health().await.unwrap().question_count, 17);
}
