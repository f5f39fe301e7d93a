mod helpers;

use std::sync::Arc;

use helpers::{at, day, locked_store, test_key, unlocked_store};
use lifelog::error::{ErrorKind, StoreError};
use lifelog::store::query::{EntryQuery, RecordingQuery};
use lifelog::store::types::{
    JournalEntry, MediaType, PrivacyLevel, QuestionCategory, QuestionRef, Recording,
};

fn text_recording(id: &str, content: &str, minutes: i64) -> Recording {
    let mut r = Recording::new(MediaType::Text, content).with_id(id);
    r.created_at = at(minutes);
    r.updated_at = at(minutes);
    r
}

#[tokio::test]
async fn put_then_get_returns_plaintext() {
    let store = unlocked_store().await;
    let r = text_recording("r1", "hello", 0).answering("childhood-home");

    let id = store.put_recording(&r).await.unwrap();
    assert_eq!(id, "r1");

    let back = store.get_recording("r1").await.unwrap().expect("stored");
    assert_eq!(back, r);
}

#[tokio::test]
async fn get_with_a_different_key_is_a_decryption_error() {
    let store = unlocked_store().await;
    store
        .put_recording(&text_recording("r1", "hello", 0))
        .await
        .unwrap();

    store.set_key(test_key(2));
    let err = store.get_recording("r1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decryption);

    // Switching back restores access; nothing was rewritten.
    store.set_key(test_key(1));
    let back = store.get_recording("r1").await.unwrap().unwrap();
    assert_eq!(back.content, "hello");
}

#[tokio::test]
async fn locked_store_refuses_sealed_reads_and_writes() {
    let store = unlocked_store().await;
    store
        .put_recording(&text_recording("r1", "hello", 0))
        .await
        .unwrap();
    store.lock();
    assert!(!store.is_unlocked());

    let read = store.get_recording("r1").await.unwrap_err();
    assert!(matches!(read, StoreError::Decryption(_)), "got {read:?}");

    let write = store
        .put_recording(&text_recording("r2", "again", 1))
        .await
        .unwrap_err();
    assert!(matches!(write, StoreError::Encryption(_)), "got {write:?}");

    // Plaintext summaries stay readable.
    let summaries = store.recording_summaries().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, "r1");
}

#[tokio::test]
async fn missing_rows_read_as_none_and_delete_is_idempotent() {
    let store = unlocked_store().await;
    assert!(store.get_recording("nope").await.unwrap().is_none());
    assert!(store.get_entry("nope").await.unwrap().is_none());

    assert!(!store.delete_recording("nope").await.unwrap());
    assert_eq!(store.pending_count().await.unwrap(), 0);

    store
        .put_recording(&text_recording("r1", "hello", 0))
        .await
        .unwrap();
    assert!(store.delete_recording("r1").await.unwrap());
    assert!(!store.delete_recording("r1").await.unwrap());
    assert!(store.get_recording("r1").await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_recording_is_rejected_before_writing() {
    let store = unlocked_store().await;
    let bad = Recording::new(MediaType::Text, "   ").with_id("r1");

    let err = store.put_recording(&bad).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(store.recording_ids().await.unwrap().is_empty());
    assert_eq!(store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn upsert_replaces_the_whole_row() {
    let store = unlocked_store().await;
    let first = text_recording("r1", "first draft", 0);
    store.put_recording(&first).await.unwrap();

    let mut second = first.clone().with_privacy(PrivacyLevel::Family);
    second.content = "final".into();
    second.updated_at = at(5);
    store.put_recording(&second).await.unwrap();

    let back = store.get_recording("r1").await.unwrap().unwrap();
    assert_eq!(back.content, "final");
    assert_eq!(back.privacy, PrivacyLevel::Family);
    assert_eq!(store.recording_ids().await.unwrap(), vec!["r1".to_string()]);
}

#[tokio::test]
async fn transcription_is_sealed_and_attached() {
    let store = unlocked_store().await;
    let voice = Recording::new(MediaType::Voice, "file:///voice/1.m4a")
        .with_id("v1")
        .with_duration(42.0);
    store.put_recording(&voice).await.unwrap();

    let updated = store
        .attach_transcription("v1", "I remember the porch.")
        .await
        .unwrap();
    assert_eq!(updated.transcription.as_deref(), Some("I remember the porch."));
    assert!(updated.updated_at >= voice.updated_at);

    let summaries = store.recording_summaries().await.unwrap();
    assert!(summaries[0].has_transcription);

    let err = store.attach_transcription("missing", "x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn query_filters_by_question_category_and_media() {
    let store = unlocked_store().await;
    store
        .put_recording(&text_recording("a", "house", 0).answering("childhood-home"))
        .await
        .unwrap();
    store
        .put_recording(&text_recording("b", "first job", 1).answering("career-first-job"))
        .await
        .unwrap();
    let mut photo = Recording::new(MediaType::Photo, "file:///p/1.jpg")
        .with_id("c")
        .answering("childhood-friend");
    photo.created_at = at(2);
    photo.updated_at = at(2);
    store.put_recording(&photo).await.unwrap();

    let childhood = store
        .query_recordings(&RecordingQuery::all().category(QuestionCategory::Childhood))
        .await
        .unwrap();
    let ids: Vec<&str> = childhood.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a"], "newest first");

    let texts = store
        .query_recordings(&RecordingQuery::all().media(MediaType::Text))
        .await
        .unwrap();
    assert_eq!(texts.len(), 2);

    let one = store
        .query_recordings(&RecordingQuery::all().question("career-first-job"))
        .await
        .unwrap();
    assert_eq!(one[0].content, "first job");

    let window = store
        .query_recordings(&RecordingQuery::all().between(at(1), at(2)))
        .await
        .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].id, "b");

    let limited = store
        .query_recordings(&RecordingQuery::all().limit(1))
        .await
        .unwrap();
    assert_eq!(limited[0].id, "c");
}

#[tokio::test]
async fn entries_roundtrip_and_filter_by_tag_and_date() {
    let store = unlocked_store().await;
    let walk = JournalEntry::new(day(2024, 5, 1), "Long walk by the river.")
        .with_id("e1")
        .with_tags(["outdoors", "calm"])
        .with_mood("content");
    let work = JournalEntry::new(day(2024, 5, 3), "Shipped the release.")
        .with_id("e2")
        .with_tags(["work"]);
    store.put_entry(&walk).await.unwrap();
    store.put_entry(&work).await.unwrap();

    assert_eq!(store.get_entry("e1").await.unwrap().unwrap(), walk);

    let tagged = store
        .query_entries(&EntryQuery::all().tagged("outdoors"))
        .await
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, "e1");

    let may = store
        .query_entries(&EntryQuery::all().dates(day(2024, 5, 2), day(2024, 5, 31)))
        .await
        .unwrap();
    assert_eq!(may.len(), 1);
    assert_eq!(may[0].body, "Shipped the release.");

    let all = store.entry_summaries().await.unwrap();
    assert_eq!(all[0].id, "e2", "latest date first");

    assert!(store.delete_entry("e1").await.unwrap());
    assert!(store.get_entry("e1").await.unwrap().is_none());
}

#[tokio::test]
async fn dangling_question_resolves_to_unknown() {
    let store = unlocked_store().await;
    store
        .put_recording(&text_recording("r1", "orphan", 0).answering("no-such-question"))
        .await
        .unwrap();

    let resolved = store.resolve_question("no-such-question").await.unwrap();
    assert!(matches!(resolved, QuestionRef::Unknown(ref id) if id == "no-such-question"));
    assert!(resolved.category().is_none());

    let summaries = store.recording_summaries().await.unwrap();
    assert_eq!(summaries[0].category, None);

    let known = store.resolve_question("childhood-home").await.unwrap();
    assert_eq!(known.category(), Some(QuestionCategory::Childhood));
}

#[tokio::test]
async fn change_passphrase_then_reencrypt_all() {
    let store = helpers::unlocked_store().await;
    store
        .put_recording(&text_recording("r1", "hello", 0))
        .await
        .unwrap();
    store
        .put_entry(&JournalEntry::new(day(2024, 5, 1), "dear diary").with_id("e1"))
        .await
        .unwrap();

    let old_key = store.change_passphrase("new secret").await.unwrap();
    assert!(store.get_recording("r1").await.is_err(), "still sealed under the old key");

    let report = store.reencrypt_all(old_key.clone()).await.unwrap();
    assert_eq!(report.recordings, 1);
    assert_eq!(report.entries, 1);
    assert_eq!(store.get_recording("r1").await.unwrap().unwrap().content, "hello");
    assert_eq!(store.get_entry("e1").await.unwrap().unwrap().body, "dear diary");

    // Second pass finds nothing left to convert.
    let again = store.reencrypt_all(old_key).await.unwrap();
    assert_eq!(again.recordings + again.entries, 0);

    // The new passphrase now unlocks the vault.
    store.lock();
    store.unlock("new secret").await.unwrap();
    assert!(store.get_recording("r1").await.unwrap().is_some());
}

#[tokio::test]
async fn interrupted_rekey_resumes_with_the_old_passphrase() {
    let store = locked_store().await;
    store.unlock("old secret").await.unwrap();
    for i in 0..3 {
        store
            .put_recording(&text_recording(&format!("r{i}"), "hello", i))
            .await
            .unwrap();
    }
    store
        .put_entry(&JournalEntry::new(day(2024, 5, 1), "dear diary").with_id("e1"))
        .await
        .unwrap();

    let old_key = store.change_passphrase("new secret").await.unwrap();
    // Only one row is converted before the process goes away.
    assert!(store.reencrypt_recording("r0", old_key).await.unwrap());
    store.lock();
    store.unlock("new secret").await.unwrap();
    assert_eq!(store.pending_reencryption().await.unwrap(), 3);
    assert!(store.health().await.unwrap().reencryption_pending);

    let wrong = store.reencrypt_with_passphrase("not it").await.unwrap();
    assert!(!wrong.is_complete());
    assert_eq!(wrong.recordings + wrong.entries, 0);
    assert_eq!(wrong.failed, ["r1", "r2", "e1"]);
    assert_eq!(store.pending_reencryption().await.unwrap(), 3);

    let report = store.reencrypt_with_passphrase("old secret").await.unwrap();
    assert!(report.is_complete());
    assert_eq!((report.recordings, report.entries), (2, 1));
    assert_eq!(store.pending_reencryption().await.unwrap(), 0);
    assert!(!store.health().await.unwrap().reencryption_pending);
    for id in ["r0", "r1", "r2"] {
        assert_eq!(store.get_recording(id).await.unwrap().unwrap().content, "hello");
    }
    assert_eq!(store.get_entry("e1").await.unwrap().unwrap().body, "dear diary");
}

#[tokio::test]
async fn reencrypt_all_counts_rows_it_cannot_open() {
    let store = unlocked_store().await;
    store
        .put_recording(&text_recording("r1", "hello", 0))
        .await
        .unwrap();
    store
        .put_entry(&JournalEntry::new(day(2024, 5, 1), "dear diary").with_id("e1"))
        .await
        .unwrap();
    store.change_passphrase("new secret").await.unwrap();

    let report = store.reencrypt_all(Arc::new(test_key(7))).await.unwrap();
    assert_eq!(report.recordings + report.entries, 0);
    assert_eq!(report.failed, ["r1", "e1"]);
    assert_eq!(store.pending_reencryption().await.unwrap(), 2);
}
