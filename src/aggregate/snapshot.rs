use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::scrape::MergeRequestRecord;

/// Flattened open merge requests of a project as of one refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectSnapshot {
    pub records: Vec<MergeRequestRecord>,
    pub repositories: Vec<String>,
    /// Repositories whose page could not be fetched or scraped; their merge
    /// requests are missing from `records`.
    pub failed_repositories: Vec<String>,
    pub refreshed_at: DateTime<Utc>,
}

impl ProjectSnapshot {
    pub fn is_partial(&self) -> bool { !self.failed_repositories.is_empty() }
}

type Slot = Option<Arc<ProjectSnapshot>>;

/// Write half of the snapshot cache. Each publish swaps in a whole new value.
#[derive(Clone)]
pub struct SnapshotPublisher {
    tx: Arc<watch::Sender<Slot>>,
}

/// Read half of the snapshot cache. Reads never wait for a refresh in
/// progress; they see the last installed snapshot or `None`.
#[derive(Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Slot>,
}

pub fn snapshot_cache() -> (SnapshotPublisher, SnapshotReader) {
    let (tx, rx) = watch::channel(None);
    (SnapshotPublisher { tx: Arc::new(tx) }, SnapshotReader { rx })
}

impl SnapshotPublisher {
    pub fn publish(&self, snapshot: ProjectSnapshot) {
        self.tx.send_replace(Some(Arc::new(snapshot)));
    }

    #[cfg(test)]
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader { rx: self.tx.subscribe() }
    }
}

impl SnapshotReader {
    pub fn latest(&self) -> Option<Arc<ProjectSnapshot>> {
        self.rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(repos: &[&str]) -> ProjectSnapshot {
        ProjectSnapshot {
            records: Vec::new(),
            repositories: repos.iter().map(|s| s.to_string()).collect(),
            failed_repositories: Vec::new(),
            refreshed_at: Utc::now(),
        }
    }

    #[test]
    fn starts_empty() {
        let (_publisher, reader) = snapshot_cache();
        assert!(reader.latest().is_none());
    }

    #[test]
    fn held_snapshot_survives_replacement() {
        let (publisher, reader) = snapshot_cache();
        publisher.publish(snap(&["a"]));
        let held = reader.latest().unwrap();
        publisher.publish(snap(&["b"]));
        assert_eq!(held.repositories, vec!["a"]);
        assert_eq!(reader.latest().unwrap().repositories, vec!["b"]);
        assert_eq!(publisher.reader().latest().unwrap().repositories, vec!["b"]);
    }
}
