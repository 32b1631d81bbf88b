//! The poll cycle and everything that drives it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::aggregate::{snapshot_cache, Aggregator, RefreshTrigger, Refresher};
use crate::chat::irc::IrcClient;
use crate::chat::{ChannelNotifier, Notifier};
use crate::config::{urls, IrcArgs, MonitorConfig, ProjectArgs, SiteConfig};
use crate::dispatch::CommandDispatcher;
use crate::error::{MonitorError, Stage, StageFailure};
use crate::feed::{detect, parse_feed, FeedEntry, MessageFormatter};
use crate::fetch::{HttpSource, PageSource};
use crate::telemetry::{self};
use crate::telemetry::ops::monitor::Phase as MonitorPhase;

mod bot;
mod scheduler;

pub use bot::MonitorBot;
pub use scheduler::Scheduler;

const OUTBOUND_QUEUE: usize = 256;

/// What survives from one poll to the next.
#[derive(Debug)]
pub struct MonitorState {
    pub previous_feed_items: Vec<FeedEntry>,
    /// Set until the first feed has been read. New items of that poll only
    /// seed the baseline.
    pub first_run: bool,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self { previous_feed_items: Vec::new(), first_run: true }
    }
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub entries: usize,
    pub new_items: usize,
    pub notified: usize,
    pub failures: Vec<StageFailure>,
}

/// One project's feed watcher. Holds capabilities only: where pages come
/// from, where notifications go, and how to ask for a snapshot refresh.
pub struct FeedMonitor {
    source: Arc<dyn PageSource>,
    site: SiteConfig,
    formatter: MessageFormatter,
    notifier: Arc<dyn Notifier>,
    refresh: RefreshTrigger,
    state: MonitorState,
}

impl FeedMonitor {
    pub fn new(source: Arc<dyn PageSource>, site: SiteConfig, notifier: Arc<dyn Notifier>, refresh: RefreshTrigger) -> Result<Self, MonitorError> {
        let formatter = MessageFormatter::new(&site.host, &site.project)?;
        Ok(Self { source, site, formatter, notifier, refresh, state: MonitorState::default() })
    }

    #[cfg(test)]
    pub fn state(&self) -> &MonitorState { &self.state }

    /// One full cycle. Never fails: every stage failure is logged and
    /// collected in the report, and the snapshot refresh is requested
    /// whatever happened to the feed.
    pub async fn poll_once(&mut self) -> CycleReport {
        let log = telemetry::monitor();
        let mut report = CycleReport::default();

        let span = log.span_kv(&MonitorPhase::Cycle, [("project", self.site.project.clone())]);
        if let Err(failure) = self.check_feed(&mut report).instrument(span).await {
            log.stage_failure(&failure);
            report.failures.push(failure);
        }

        let _s = log.span(&MonitorPhase::Trigger).entered();
        self.refresh.fire();
        log.cycle_summary(report.entries, report.new_items, report.notified, report.failures.len());
        report
    }

    async fn check_feed(&mut self, report: &mut CycleReport) -> Result<(), StageFailure> {
        let log = telemetry::monitor();
        let url = urls::feed_url(&self.site.host, &self.site.project);

        let body = self.source.fetch(&url, self.site.feed_timeout)
            .instrument(log.span_kv(&MonitorPhase::FetchFeed, [("url", url.clone())]))
            .await
            .map_err(|e| StageFailure::new(Stage::FetchFeed, &url, e))?;
        let current = {
            let _s = log.span(&MonitorPhase::ParseFeed).entered();
            parse_feed(&body).map_err(|e| StageFailure::new(Stage::ParseFeed, &url, e))?
        };
        report.entries = current.len();

        let detection = {
            let _s = log.span(&MonitorPhase::Detect).entered();
            detect(&self.state.previous_feed_items, current)
        };
        self.state.previous_feed_items = detection.next_previous;
        report.new_items = detection.new_items.len();

        if self.state.first_run {
            self.state.first_run = false;
            log.info(format!("📥 Baseline of {} feed item(s) recorded for {}", report.entries, self.site.project));
            return Ok(());
        }

        for entry in &detection.new_items {
            let Some(message) = self.formatter.format(entry) else {
                log.debug(format!("skipping feed item: {}", entry.title));
                continue;
            };
            let sent = self.notifier.send(&message)
                .instrument(log.span_kv(&MonitorPhase::Notify, [("id", entry.id.clone())]))
                .await;
            match sent {
                Ok(()) => report.notified += 1,
                Err(e) => {
                    let failure = StageFailure::new(Stage::Notify, &message, e);
                    log.stage_failure(&failure);
                    report.failures.push(failure);
                }
            }
        }
        Ok(())
    }
}

/// `mrq-monitor monitor <project>`: the long-running bot.
#[derive(Args)]
pub struct MonitorCmd {
    #[command(flatten)]
    pub project: ProjectArgs,
    #[command(flatten)]
    pub irc: IrcArgs,
}

pub async fn run(args: MonitorCmd) -> Result<()> {
    let cfg = MonitorConfig::from_args(&args.project, &args.irc)?;
    let log = telemetry::monitor();
    let _g = log.root_span_kv([
        ("host", cfg.site.host.clone()),
        ("project", cfg.site.project.clone()),
        ("channel", cfg.irc.channel.clone()),
        ("interval_secs", cfg.poll_interval.as_secs().to_string()),
    ]).entered();

    let source: Arc<dyn PageSource> = Arc::new(HttpSource::new()?);
    let cancel = CancellationToken::new();

    let (publisher, reader) = snapshot_cache();
    let refresher = Refresher::new(Aggregator::new(source.clone(), cfg.site.clone()), publisher);
    let trigger = refresher.trigger();
    let refresher_task = tokio::spawn(refresher.run(cancel.clone()));

    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let client = IrcClient::new(cfg.irc.clone());
    let notifier = Arc::new(ChannelNotifier::new(cfg.irc.channel.clone(), out_tx, client.connected_flag()));
    let monitor = FeedMonitor::new(source, cfg.site.clone(), notifier, trigger)?;
    let bot = Arc::new(MonitorBot::new(Scheduler::new(monitor), CommandDispatcher::new(reader), cfg.poll_interval));
    let chat_task = tokio::spawn(client.run(bot.clone(), out_rx, cancel.clone()));

    log.info(format!("🚀 Watching {} for {}", urls::feed_url(&cfg.site.host, &cfg.site.project), cfg.irc.channel));
    tokio::signal::ctrl_c().await?;
    log.info("🛑 Shutting down");

    cancel.cancel();
    bot.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(5), chat_task).await;
    let _ = refresher_task.await;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::aggregate::tests::site;
    use crate::chat::RecordingNotifier;
    use crate::fetch::MockSource;

    pub(crate) const FEED_URL: &str = "http://h/proj.atom";

    pub(crate) fn atom(entries: &[(&str, &str)]) -> String {
        let body: String = entries.iter().map(|(title, id)| format!(
            "<entry><id>{id}</id><updated>2011-12-17T15:35:14Z</updated><title>{title}</title></entry>"
        )).collect();
        format!(r#"<feed xmlns="http://www.w3.org/2005/Atom"><id>urn:proj</id><title>proj</title><updated>2011-12-17T16:00:00Z</updated>{body}</feed>"#)
    }

    pub(crate) const X: (&str, &str) = ("alice updated merge request proj/repo #1 State changed", "e1");
    pub(crate) const Y: (&str, &str) = ("bob opened merge request proj/repo #2", "e2");

    fn monitor(src: Arc<MockSource>, notifier: Arc<RecordingNotifier>) -> FeedMonitor {
        FeedMonitor::new(src, site(), notifier, RefreshTrigger::default()).unwrap()
    }

    #[tokio::test]
    async fn items_seen_on_the_first_poll_are_never_notified() {
        let src = Arc::new(MockSource::new());
        src.push_page(FEED_URL, atom(&[X]));
        src.push_page(FEED_URL, atom(&[Y, X]));
        let notifier = Arc::new(RecordingNotifier::new());
        let mut m = monitor(src, notifier.clone());

        let first = m.poll_once().await;
        assert_eq!((first.entries, first.new_items, first.notified), (1, 1, 0));
        assert!(notifier.take().is_empty());
        assert!(!m.state().first_run);

        let second = m.poll_once().await;
        assert_eq!(second.notified, 1);
        assert_eq!(notifier.take(), vec!["http://h/proj/repo/merge_requests/2 "]);
    }

    #[tokio::test]
    async fn empty_first_poll_is_the_baseline() {
        let src = Arc::new(MockSource::new());
        src.push_page(FEED_URL, atom(&[]));
        src.push_page(FEED_URL, atom(&[X]));
        src.push_page(FEED_URL, atom(&[X, Y]));
        let notifier = Arc::new(RecordingNotifier::new());
        let mut m = monitor(src, notifier.clone());

        m.poll_once().await;
        assert!(notifier.take().is_empty());
        m.poll_once().await;
        assert_eq!(notifier.take(), vec!["http://h/proj/repo/merge_requests/1 State changed"]);
        m.poll_once().await;
        assert_eq!(notifier.take(), vec!["http://h/proj/repo/merge_requests/2 "]);
    }

    #[tokio::test]
    async fn failed_feed_keeps_first_run_and_still_refreshes() {
        let src = Arc::new(MockSource::new());
        src.push_error(FEED_URL, "timeout");
        src.push_page(FEED_URL, atom(&[X]));
        let notifier = Arc::new(RecordingNotifier::new());
        let trigger = RefreshTrigger::default();
        let mut m = FeedMonitor::new(src, site(), notifier.clone(), trigger.clone()).unwrap();

        let report = m.poll_once().await;
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, Stage::FetchFeed);
        assert_eq!(report.failures[0].input, FEED_URL);
        assert!(m.state().first_run);
        tokio::time::timeout(Duration::from_secs(1), trigger.fired()).await.unwrap();

        // the next successful poll only records the baseline
        m.poll_once().await;
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn unparseable_feed_is_a_parse_stage_failure() {
        let src = Arc::new(MockSource::new());
        src.push_page(FEED_URL, "<html>502</html>");
        let mut m = monitor(src, Arc::new(RecordingNotifier::new()));
        let report = m.poll_once().await;
        assert_eq!(report.failures[0].stage, Stage::ParseFeed);
        assert!(report.failures[0].error.is_parse());
    }

    #[tokio::test]
    async fn a_refused_notification_does_not_stop_the_rest() {
        let z = ("carol updated merge request proj/other #3", "e3");
        let src = Arc::new(MockSource::new());
        src.push_page(FEED_URL, atom(&[]));
        src.push_page(FEED_URL, atom(&[X, ("dave commented on merge request proj/repo #1", "c1"), z]));
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_on("http://h/proj/repo/merge_requests/1 State changed");
        let mut m = monitor(src, notifier.clone());

        m.poll_once().await;
        let report = m.poll_once().await;
        assert_eq!(report.new_items, 3);
        assert_eq!(report.notified, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, Stage::Notify);
        assert_eq!(notifier.sent(), vec!["http://h/proj/other/merge_requests/3 "]);
    }
}
