//! Query predicates and long-lived reactive queries.
//!
//! A predicate ([`RecordingQuery`], [`EntryQuery`]) runs once via
//! `LocalStore::query_*` or stays subscribed via [`LocalStore::watch`], which
//! returns a [`LiveQuery`]. Each emission is a complete, finite snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::crypto::DerivedKey;
use crate::db::format_timestamp;
use crate::error::StoreResult;

use super::events::{ChangeEvent, ChangeKind, Table};
use super::types::{JournalEntry, MediaType, QuestionCategory, Recording};
use super::{entries, recordings, LocalStore};

/// Filter over the `recordings` table. All fields are ANDed; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingQuery {
    pub question_id: Option<String>,
    pub media_type: Option<MediaType>,
    /// Matches recordings whose question currently belongs to this category.
    pub category: Option<QuestionCategory>,
    /// Inclusive lower bound on `created_at`.
    pub created_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl RecordingQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn question(mut self, id: impl Into<String>) -> Self {
        self.question_id = Some(id.into());
        self
    }

    pub fn media(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn category(mut self, category: QuestionCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_after = Some(from);
        self.created_before = Some(to);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// `WHERE ...` clause (possibly empty) plus its positional parameters.
    pub(crate) fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(qid) = &self.question_id {
            params.push(Value::Text(qid.clone()));
            clauses.push(format!("question_id = ?{}", params.len()));
        }
        if let Some(m) = self.media_type {
            params.push(Value::Text(m.as_str().to_string()));
            clauses.push(format!("media_type = ?{}", params.len()));
        }
        if let Some(c) = self.category {
            params.push(Value::Text(c.as_str().to_string()));
            clauses.push(format!(
                "question_id IN (SELECT id FROM questions WHERE category = ?{})",
                params.len()
            ));
        }
        if let Some(from) = &self.created_after {
            params.push(Value::Text(format_timestamp(from)));
            clauses.push(format!("created_at >= ?{}", params.len()));
        }
        if let Some(to) = &self.created_before {
            params.push(Value::Text(format_timestamp(to)));
            clauses.push(format!("created_at < ?{}", params.len()));
        }

        (join_where(&clauses), params)
    }
}

/// Filter over the `journal_entries` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryQuery {
    /// Inclusive.
    pub from: Option<NaiveDate>,
    /// Inclusive.
    pub to: Option<NaiveDate>,
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

impl EntryQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn dates(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub(crate) fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(from) = self.from {
            params.push(Value::Text(from.format("%Y-%m-%d").to_string()));
            clauses.push(format!("entry_date >= ?{}", params.len()));
        }
        if let Some(to) = self.to {
            params.push(Value::Text(to.format("%Y-%m-%d").to_string()));
            clauses.push(format!("entry_date <= ?{}", params.len()));
        }
        if let Some(tag) = &self.tag {
            params.push(Value::Text(tag.clone()));
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM json_each(journal_entries.tags) WHERE value = ?{})",
                params.len()
            ));
        }

        (join_where(&clauses), params)
    }
}

fn join_where(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

pub(crate) fn limit_clause(limit: Option<usize>) -> String {
    limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default()
}

/// A predicate that can back a [`LiveQuery`].
pub trait LiveSource: Clone + Send + Sync + 'static {
    type Item: Clone + Send + 'static;

    /// Topic whose changes may affect this predicate.
    const TABLE: Table;

    /// Evaluate the predicate, decrypting with `key`.
    fn fetch(&self, conn: &Connection, key: &DerivedKey) -> StoreResult<Vec<Self::Item>>;

    fn item_id(item: &Self::Item) -> &str;
}

impl LiveSource for RecordingQuery {
    type Item = Recording;
    const TABLE: Table = Table::Recordings;

    fn fetch(&self, conn: &Connection, key: &DerivedKey) -> StoreResult<Vec<Recording>> {
        recordings::query_recordings(conn, self, key)
    }

    fn item_id(item: &Recording) -> &str {
        &item.id
    }
}

impl LiveSource for EntryQuery {
    type Item = JournalEntry;
    const TABLE: Table = Table::JournalEntries;

    fn fetch(&self, conn: &Connection, key: &DerivedKey) -> StoreResult<Vec<JournalEntry>> {
        entries::query_entries(conn, self, key)
    }

    fn item_id(item: &JournalEntry) -> &str {
        &item.id
    }
}

/// Cancels a [`LiveQuery`] from anywhere, including while it is awaiting.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A long-lived subscription to a predicate.
///
/// The first call to [`LiveQuery::next`] returns the current snapshot. Later
/// calls wait for a committed change on the predicate's table that touches
/// it: a put whose row now matches, or a put/delete of a row that was in the
/// previous snapshot. Unrelated writes are skipped without emitting.
pub struct LiveQuery<Q: LiveSource> {
    query: Q,
    store: LocalStore,
    changes: broadcast::Receiver<ChangeEvent>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
    last_ids: HashSet<String>,
    primed: bool,
}

impl<Q: LiveSource> LiveQuery<Q> {
    pub(crate) fn new(query: Q, store: LocalStore) -> Self {
        // Subscribe before the first snapshot so no write can slip between them.
        let changes = store.bus().subscribe(Q::TABLE);
        let (tx, cancel_rx) = watch::channel(false);
        Self {
            query,
            store,
            changes,
            cancel_tx: Arc::new(tx),
            cancel_rx,
            last_ids: HashSet::new(),
            primed: false,
        }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Stop notifications. Any later `next` returns `None`.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Next snapshot, or `None` once cancelled or the store is gone.
    pub async fn next(&mut self) -> Option<StoreResult<Vec<Q::Item>>> {
        if self.is_cancelled() {
            return None;
        }
        if !self.primed {
            self.primed = true;
            return Some(self.refresh().await);
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel_rx.changed() => return None,
                event = self.changes.recv() => event,
            };
            if self.is_cancelled() {
                return None;
            }

            match event {
                Ok(event) => {
                    let was_present = self.last_ids.contains(&event.id);
                    if event.kind == ChangeKind::Delete && !was_present {
                        continue;
                    }
                    let snapshot = self.refresh().await;
                    let now_present = self.last_ids.contains(&event.id);
                    if snapshot.is_err() || was_present || now_present {
                        return Some(snapshot);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(table = %Q::TABLE, skipped, "live query lagged, refreshing");
                    return Some(self.refresh().await);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn refresh(&mut self) -> StoreResult<Vec<Q::Item>> {
        let items = self.store.fetch_live(self.query.clone()).await?;
        self.last_ids = items.iter().map(|i| Q::item_id(i).to_string()).collect();
        Ok(items)
    }
}

impl<Q: LiveSource> Drop for LiveQuery<Q> {
    fn drop(&mut self) {
        self.cancel_tx.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_recording_query_has_no_where() {
        let (clause, params) = RecordingQuery::all().where_clause();
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn recording_query_numbers_params_in_order() {
        let q = RecordingQuery::all()
            .media(MediaType::Voice)
            .category(QuestionCategory::Family);
        let (clause, params) = q.where_clause();
        assert_eq!(
            clause,
            "WHERE media_type = ?1 AND question_id IN (SELECT id FROM questions WHERE category = ?2)"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn entry_query_filters_by_tag() {
        let (clause, params) = EntryQuery::all().tagged("travel").where_clause();
        assert!(clause.contains("json_each"));
        assert_eq!(params, vec![Value::Text("travel".into())]);
    }

    #[test]
    fn limit_clause_formats() {
        assert_eq!(limit_clause(Some(5)), " LIMIT 5");
        assert_eq!(limit_clause(None), "");
    }
}
