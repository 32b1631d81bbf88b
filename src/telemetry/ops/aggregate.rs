use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Aggregate;

#[derive(Copy, Clone, Debug)]
pub enum Phase { FetchProject, ScrapeProject, Repository, Publish }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::FetchProject => "fetch_project",
        Phase::ScrapeProject => "scrape_project",
        Phase::Repository => "repository",
        Phase::Publish => "publish",
    }}
    fn span(&self) -> Span { match self {
        Phase::FetchProject => info_span!("fetch_project"),
        Phase::ScrapeProject => info_span!("scrape_project"),
        Phase::Repository => info_span!("repository"),
        Phase::Publish => info_span!("publish"),
    }}
}

impl OpMarker for Aggregate {
    const NAME: &'static str = "aggregate";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("aggregate") }
}
