use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::telemetry;
use crate::telemetry::ops::aggregate::Phase as AggregatePhase;

use super::snapshot::SnapshotPublisher;
use super::Aggregator;

/// Handle used by the poll cycle to ask for a snapshot refresh without
/// waiting for it. Requests made while a refresh runs collapse into one.
#[derive(Clone, Default)]
pub struct RefreshTrigger {
    notify: Arc<Notify>,
}

impl RefreshTrigger {
    pub fn fire(&self) {
        self.notify.notify_one();
    }

    /// Resolves once a request is pending, consuming it.
    pub async fn fired(&self) {
        self.notify.notified().await;
    }
}

/// Runs the aggregator off the poll path and installs what it produces.
pub struct Refresher {
    aggregator: Aggregator,
    publisher: SnapshotPublisher,
    trigger: RefreshTrigger,
}

impl Refresher {
    pub fn new(aggregator: Aggregator, publisher: SnapshotPublisher) -> Self {
        Self { aggregator, publisher, trigger: RefreshTrigger::default() }
    }

    pub fn trigger(&self) -> RefreshTrigger { self.trigger.clone() }

    /// One refresh. Full and partial results are published; a failed project
    /// page leaves the previous snapshot in place. Returns whether anything
    /// was published.
    pub async fn refresh_once(&self) -> bool {
        let log = telemetry::aggregate();
        match self.aggregator.refresh().await {
            Ok(outcome) => {
                let _s = log.span(&AggregatePhase::Publish).entered();
                let (snapshot, partial) = outcome.into_parts();
                if let Some(err) = partial {
                    log.warn(format!("⚠️ publishing partial snapshot: {err}"));
                }
                log.refresh_summary(snapshot.repositories.len(), snapshot.records.len(), snapshot.failed_repositories.len());
                self.publisher.publish(snapshot);
                true
            }
            Err(failure) => {
                log.stage_failure(&failure);
                false
            }
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.trigger.fired() => { self.refresh_once().await; }
            }
        }
    }
}
