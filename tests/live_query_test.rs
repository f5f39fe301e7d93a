mod helpers;

use std::time::Duration;

use helpers::{at, day, unlocked_store};
use lifelog::store::events::{ChangeKind, ChangeOrigin, Table};
use lifelog::store::query::{EntryQuery, RecordingQuery};
use lifelog::store::types::{JournalEntry, MediaType, Recording};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn answer(id: &str, question: &str, minutes: i64) -> Recording {
    let mut r = Recording::new(MediaType::Text, format!("answer {id}"))
        .with_id(id)
        .answering(question);
    r.created_at = at(minutes);
    r.updated_at = at(minutes);
    r
}

#[tokio::test]
async fn first_emission_is_the_current_snapshot() {
    let store = unlocked_store().await;
    store
        .put_recording(&answer("a", "childhood-home", 0))
        .await
        .unwrap();

    let mut live = store.watch(RecordingQuery::all().question("childhood-home"));
    let first = live.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].content, "answer a");
}

#[tokio::test]
async fn matching_put_emits_and_unrelated_put_is_skipped() {
    let store = unlocked_store().await;
    let mut live = store.watch(RecordingQuery::all().question("childhood-home"));
    assert!(live.next().await.unwrap().unwrap().is_empty());

    // Other question first, then a match. Only the match produces an emission.
    store
        .put_recording(&answer("other", "career-first-job", 0))
        .await
        .unwrap();
    store
        .put_recording(&answer("mine", "childhood-home", 1))
        .await
        .unwrap();

    let snapshot = timeout(WAIT, live.next()).await.unwrap().unwrap().unwrap();
    let ids: Vec<&str> = snapshot.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["mine"]);
}

#[tokio::test]
async fn delete_of_a_listed_row_emits_the_shrunken_set() {
    let store = unlocked_store().await;
    store
        .put_recording(&answer("a", "childhood-home", 0))
        .await
        .unwrap();
    store
        .put_recording(&answer("b", "childhood-home", 1))
        .await
        .unwrap();

    let mut live = store.watch(RecordingQuery::all().question("childhood-home"));
    assert_eq!(live.next().await.unwrap().unwrap().len(), 2);

    store.delete_recording("a").await.unwrap();
    let snapshot = timeout(WAIT, live.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "b");
}

#[tokio::test]
async fn entry_watch_follows_tag_changes() {
    let store = unlocked_store().await;
    let mut live = store.watch(EntryQuery::all().tagged("travel"));
    assert!(live.next().await.unwrap().unwrap().is_empty());

    let entry = JournalEntry::new(day(2024, 6, 1), "Landed in Lisbon.")
        .with_id("e1")
        .with_tags(["travel"]);
    store.put_entry(&entry).await.unwrap();
    let snapshot = timeout(WAIT, live.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);

    // Retagging drops it from the set; the watcher sees the removal.
    let retagged = entry.clone().with_tags(["home"]);
    store.put_entry(&retagged).await.unwrap();
    let snapshot = timeout(WAIT, live.next()).await.unwrap().unwrap().unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn cancel_ends_the_stream() {
    let store = unlocked_store().await;
    let mut live = store.watch(RecordingQuery::all());
    live.next().await.unwrap().unwrap();

    live.cancel();
    assert!(live.is_cancelled());
    assert!(live.next().await.is_none());

    // Writes after cancellation are harmless.
    store.put_recording(&answer("a", "childhood-home", 0)).await.unwrap();
    assert!(live.next().await.is_none());
}

#[tokio::test]
async fn cancel_handle_wakes_a_pending_next() {
    let store = unlocked_store().await;
    let mut live = store.watch(RecordingQuery::all());
    live.next().await.unwrap().unwrap();

    let handle = live.cancel_handle();
    let waiter = tokio::spawn(async move { live.next().await.is_none() });
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();

    assert!(timeout(WAIT, waiter).await.unwrap().unwrap());
}

#[tokio::test]
async fn raw_topic_carries_local_events_after_commit() {
    let store = unlocked_store().await;
    let mut recordings = store.subscribe(Table::Recordings);
    let mut entries = store.subscribe(Table::JournalEntries);

    store.put_recording(&answer("a", "childhood-home", 0)).await.unwrap();

    let event = timeout(WAIT, recordings.recv()).await.unwrap().unwrap();
    assert_eq!(event.id, "a");
    assert_eq!(event.kind, ChangeKind::Put);
    assert_eq!(event.origin, ChangeOrigin::Local);
    // The write is visible by the time the event arrives.
    assert!(store.get_recording("a").await.unwrap().is_some());

    assert!(entries.try_recv().is_err(), "entries topic stays quiet");
}
