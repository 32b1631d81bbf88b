use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::telemetry;

use super::FeedMonitor;

struct Running {
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

/// Two-state lifecycle around a [`FeedMonitor`]. While running, a cycle
/// starts right away and then once per interval. The monitor sits behind an
/// async mutex, so a cycle from a previous run that is still winding down
/// and the first cycle of a new run never overlap.
pub struct Scheduler {
    monitor: Arc<Mutex<FeedMonitor>>,
    running: Option<Running>,
}

impl Scheduler {
    pub fn new(monitor: FeedMonitor) -> Self {
        Self { monitor: Arc::new(Mutex::new(monitor)), running: None }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool { self.running.is_some() }

    /// Stopped -> Running. Returns false, changing nothing, when already running.
    pub fn start(&mut self, interval: Duration) -> bool {
        if self.running.is_some() { return false; }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(schedule(self.monitor.clone(), interval, cancel.clone()));
        self.running = Some(Running { cancel, _task: task });
        telemetry::monitor().info(format!("▶️ Polling every {}s", interval.as_secs()));
        true
    }

    /// Running -> Stopped. Stopping a stopped scheduler is a no-op; returns
    /// whether there was anything to stop.
    pub fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else { return false };
        running.cancel.cancel();
        telemetry::monitor().info("⏹️ Polling stopped");
        true
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) { self.stop(); }
}

// Ticks are taken only after the previous cycle settles, and a late cycle
// pushes the schedule back instead of bursting.
async fn schedule(monitor: Arc<Mutex<FeedMonitor>>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let mut monitor = monitor.lock().await;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = monitor.poll_once() => {}
        }
    }
}
