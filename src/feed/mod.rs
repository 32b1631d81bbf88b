use anyhow::{bail, Result};
use clap::Args;
use tracing::Instrument;

use crate::config::{urls, ProjectArgs, SiteConfig};
use crate::error::{Stage, StageFailure};
use crate::fetch::{HttpSource, PageSource};
use crate::telemetry::{self};
use crate::telemetry::ops::feed::Phase as FeedPhase;

mod change;
mod format;
mod parse;
pub mod types;

pub use change::detect;
pub use format::MessageFormatter;
pub use parse::parse_feed;
pub use types::FeedEntry;

/// `mrq-monitor feed <project>`: read the feed once and print every entry
/// that would be announced, ignoring first-run suppression.
#[derive(Args)]
pub struct FeedCmd {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub async fn run(args: FeedCmd) -> Result<()> {
    let log = telemetry::feed();
    let site = SiteConfig::from_args(&args.project)?;
    let url = urls::feed_url(&site.host, &site.project);
    let _g = log.root_span_kv([("url", url.clone())]).entered();

    let source = HttpSource::new()?;
    let body = match source.fetch(&url, site.feed_timeout).instrument(log.span(&FeedPhase::Fetch)).await {
        Ok(body) => body,
        Err(e) => {
            let failure = StageFailure::new(Stage::FetchFeed, &url, e);
            log.stage_failure(&failure);
            bail!("{}", failure);
        }
    };
    let entries = {
        let _s = log.span(&FeedPhase::Parse).entered();
        match parse_feed(&body) {
            Ok(entries) => entries,
            Err(e) => {
                let failure = StageFailure::new(Stage::ParseFeed, &url, e);
                log.stage_failure(&failure);
                bail!("{}", failure);
            }
        }
    };

    let messages: Vec<String> = {
        let _s = log.span(&FeedPhase::Format).entered();
        let formatter = MessageFormatter::new(&site.host, &site.project)?;
        entries.iter().filter_map(|e| formatter.format(e)).collect()
    };
    log.info(format!("📰 {} entr(ies), {} would be announced", entries.len(), messages.len()));

    if telemetry::config::json_mode() {
        let check = types::FeedCheck { url, entries: entries.len(), messages };
        log.result(&check)?;
    } else {
        for m in &messages { println!("{m}"); }
    }
    Ok(())
}
