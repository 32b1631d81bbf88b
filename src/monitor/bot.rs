use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::chat::ChatHandler;
use crate::dispatch::CommandDispatcher;
use crate::telemetry;

use super::Scheduler;

/// Glue between the chat transport and the core: joining the channel starts
/// polling, losing it stops polling, addressed messages go to the dispatcher.
pub struct MonitorBot {
    scheduler: Mutex<Scheduler>,
    dispatcher: CommandDispatcher,
    interval: Duration,
}

impl MonitorBot {
    pub fn new(scheduler: Scheduler, dispatcher: CommandDispatcher, interval: Duration) -> Self {
        Self { scheduler: Mutex::new(scheduler), dispatcher, interval }
    }

    #[cfg(test)]
    pub fn is_polling(&self) -> bool { self.scheduler().is_running() }

    pub fn shutdown(&self) { self.scheduler().stop(); }

    fn scheduler(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChatHandler for MonitorBot {
    async fn on_connected(&self) {
        self.scheduler().start(self.interval);
    }

    async fn on_disconnected(&self) {
        if self.scheduler().stop() {
            telemetry::monitor().warn("Chat link lost, polling paused until it returns");
        }
    }

    async fn on_inbound_message(&self, user: &str, _channel: &str, text: &str) -> Option<String> {
        self.dispatcher.handle(user, text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::aggregate::tests::site;
    use crate::aggregate::{snapshot_cache, RefreshTrigger};
    use crate::chat::RecordingNotifier;
    use crate::fetch::MockSource;
    use crate::monitor::tests::{atom, FEED_URL, X};
    use crate::monitor::FeedMonitor;

    #[tokio::test(start_paused = true)]
    async fn connection_lifecycle_drives_the_scheduler() {
        let src = Arc::new(MockSource::new());
        src.push_page(FEED_URL, atom(&[X]));
        let monitor = FeedMonitor::new(src.clone(), site(), Arc::new(RecordingNotifier::new()), RefreshTrigger::default()).unwrap();
        let (_publisher, reader) = snapshot_cache();
        let bot = MonitorBot::new(Scheduler::new(monitor), CommandDispatcher::new(reader), Duration::from_secs(60));

        assert!(!bot.is_polling());
        bot.on_connected().await;
        assert!(bot.is_polling());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(src.calls().len(), 1);

        bot.on_disconnected().await;
        bot.on_disconnected().await;
        assert!(!bot.is_polling());

        assert_eq!(bot.on_inbound_message("alice", "#proj", "list").await.unwrap(), "alice: no data available");
        bot.shutdown();
    }
}
