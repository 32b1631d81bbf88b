use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;
use futures::future::join_all;
use serde::Serialize;
use tracing::Instrument;

use crate::config::{urls, ProjectArgs, SiteConfig};
use crate::error::{MonitorError, RepoFailure, Stage, StageFailure};
use crate::fetch::{HttpSource, PageSource};
use crate::output::types::Meta;
use crate::scrape::{self, MergeRequestRecord};
use crate::telemetry::{self};
use crate::telemetry::ops::aggregate::Phase as AggregatePhase;

mod refresher;
pub mod snapshot;

pub use refresher::{RefreshTrigger, Refresher};
pub use snapshot::{snapshot_cache, ProjectSnapshot, SnapshotReader};

/// Walks every repository of a project and collects its open merge requests.
#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn PageSource>,
    site: SiteConfig,
}

/// A finished refresh: the snapshot plus whichever repositories dropped out.
#[derive(Debug)]
pub struct AggregateOutcome {
    pub snapshot: ProjectSnapshot,
    pub failures: Vec<RepoFailure>,
}

impl AggregateOutcome {
    /// Split into the snapshot and, when some repositories failed, a
    /// `PartialAggregation` error naming them.
    pub fn into_parts(self) -> (ProjectSnapshot, Option<MonitorError>) {
        let partial = if self.failures.is_empty() { None } else { Some(MonitorError::PartialAggregation { failed: self.failures }) };
        (self.snapshot, partial)
    }
}

impl Aggregator {
    pub fn new(source: Arc<dyn PageSource>, site: SiteConfig) -> Self {
        Self { source, site }
    }

    /// Fails only when the project page itself is unusable. Repository
    /// failures are collected into the outcome and never stop the others.
    pub async fn refresh(&self) -> Result<AggregateOutcome, StageFailure> {
        let log = telemetry::aggregate();
        let project_url = urls::project_url(&self.site.host, &self.site.project);

        let html = self.source.fetch(&project_url, self.site.page_timeout)
            .instrument(log.span_kv(&AggregatePhase::FetchProject, [("url", project_url.clone())]))
            .await
            .map_err(|e| StageFailure::new(Stage::FetchProject, &project_url, e))?;
        let repositories = {
            let _s = log.span(&AggregatePhase::ScrapeProject).entered();
            scrape::scrape_repositories(&String::from_utf8_lossy(&html))
                .map_err(|e| StageFailure::new(Stage::ScrapeProject, &project_url, e))?
        };
        log.info_kv(&format!("🔎 {} repositor(ies) in {}", repositories.len(), self.site.project), [("repositories", repositories.join(","))]);

        let results = join_all(repositories.iter().map(|repo| self.repository(repo))).await;

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(mut rows) => records.append(&mut rows),
                Err(failure) => {
                    let url = urls::merge_requests_url(&self.site.host, &self.site.project, &failure.repository);
                    log.error_kv(
                        &format!("❌ {} failed on {}: {}", failure.stage, url, failure.error),
                        [("stage", failure.stage.name().to_string()), ("input", url.clone()), ("repository", failure.repository.clone())],
                    );
                    failures.push(failure);
                }
            }
        }

        let snapshot = ProjectSnapshot {
            records,
            failed_repositories: failures.iter().map(|f| f.repository.clone()).collect(),
            repositories,
            refreshed_at: Utc::now(),
        };
        Ok(AggregateOutcome { snapshot, failures })
    }

    async fn repository(&self, repo: &str) -> Result<Vec<MergeRequestRecord>, RepoFailure> {
        let log = telemetry::aggregate();
        let url = urls::merge_requests_url(&self.site.host, &self.site.project, repo);
        let span = log.span_kv(&AggregatePhase::Repository, [("repository", repo.to_string())]);

        let fail = |stage, error| RepoFailure { repository: repo.to_string(), stage, error };
        let html = self.source.fetch(&url, self.site.page_timeout).instrument(span).await
            .map_err(|e| fail(Stage::FetchRepository, e))?;
        let mut rows = scrape::scrape_merge_requests(&String::from_utf8_lossy(&html))
            .map_err(|e| fail(Stage::ScrapeRepository, e))?;
        for row in rows.iter_mut() { row.repository = repo.to_string(); }
        Ok(rows)
    }
}

/// `mrq-monitor list <project>`: one authoritative scrape, printed.
#[derive(Args)]
pub struct ListCmd {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Serialize)]
struct ListResult<'a> {
    project: &'a str,
    snapshot: &'a ProjectSnapshot,
}

pub async fn run(args: ListCmd) -> Result<()> {
    let log = telemetry::aggregate();
    let site = SiteConfig::from_args(&args.project)?;
    let _g = log.root_span_kv([("host", site.host.clone()), ("project", site.project.clone())]).entered();
    let t0 = Instant::now();

    let aggregator = Aggregator::new(Arc::new(HttpSource::new()?), site.clone());
    let outcome = match aggregator.refresh().await {
        Ok(outcome) => outcome,
        Err(failure) => {
            log.stage_failure(&failure);
            bail!("{}", failure);
        }
    };
    let (snapshot, partial) = outcome.into_parts();
    if let Some(err) = &partial { log.warn(format!("⚠️ {err}")); }

    if telemetry::config::json_mode() {
        let result = ListResult { project: &site.project, snapshot: &snapshot };
        let env = crate::output::types::Envelope::result("list", &result, Some(Meta { duration_ms: Some(t0.elapsed().as_millis()) }))?;
        crate::output::emit(&env)?;
    } else if snapshot.records.is_empty() {
        println!("no open merge requests");
    } else {
        for record in &snapshot.records { println!("{}", record.list_line()); }
    }
    Ok(())
}
