//! Typed change topics, one per table.
//!
//! Every committed write publishes a [`ChangeEvent`] on its table's broadcast
//! channel after the transaction commits. Delivery is eventual: receivers see
//! the event the next time they poll, never inside the write itself.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Tables that publish change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Questions,
    Recordings,
    JournalEntries,
    UserSettings,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Questions => "questions",
            Self::Recordings => "recordings",
            Self::JournalEntries => "journal_entries",
            Self::UserSettings => "user_settings",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "questions" => Ok(Self::Questions),
            "recordings" => Ok(Self::Recordings),
            "journal_entries" => Ok(Self::JournalEntries),
            "user_settings" => Ok(Self::UserSettings),
            _ => Err(format!("unknown table: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Put,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "put" => Ok(Self::Put),
            "delete" => Ok(Self::Delete),
            _ => Err(format!("unknown change kind: {s}")),
        }
    }
}

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub id: String,
    pub kind: ChangeKind,
    pub origin: ChangeOrigin,
}

impl ChangeEvent {
    pub fn local(table: Table, id: &str, kind: ChangeKind) -> Self {
        Self {
            table,
            id: id.to_string(),
            kind,
            origin: ChangeOrigin::Local,
        }
    }

    pub fn remote(table: Table, id: &str, kind: ChangeKind) -> Self {
        Self {
            table,
            id: id.to_string(),
            kind,
            origin: ChangeOrigin::Remote,
        }
    }
}

/// One broadcast channel per table.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    questions: broadcast::Sender<ChangeEvent>,
    recordings: broadcast::Sender<ChangeEvent>,
    entries: broadcast::Sender<ChangeEvent>,
    settings: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            questions: broadcast::channel(capacity).0,
            recordings: broadcast::channel(capacity).0,
            entries: broadcast::channel(capacity).0,
            settings: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, table: Table) -> &broadcast::Sender<ChangeEvent> {
        match table {
            Table::Questions => &self.questions,
            Table::Recordings => &self.recordings,
            Table::JournalEntries => &self.entries,
            Table::UserSettings => &self.settings,
        }
    }

    /// Publish on the event's table topic. No receivers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let table = event.table;
        let id = event.id.clone();
        let delivered = self.sender(table).send(event).unwrap_or(0);
        tracing::trace!(table = %table, id = %id, receivers = delivered, "change published");
    }

    pub fn subscribe(&self, table: Table) -> broadcast::Receiver<ChangeEvent> {
        self.sender(table).subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_stay_on_their_topic() {
        let bus = ChangeBus::new(8);
        let mut recordings = bus.subscribe(Table::Recordings);
        let mut entries = bus.subscribe(Table::JournalEntries);

        bus.publish(ChangeEvent::local(Table::Recordings, "r1", ChangeKind::Put));

        let event = recordings.recv().await.unwrap();
        assert_eq!(event.id, "r1");
        assert_eq!(event.origin, ChangeOrigin::Local);
        assert!(entries.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = ChangeBus::default();
        bus.publish(ChangeEvent::remote(Table::UserSettings, "settings", ChangeKind::Put));
    }
}
