use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Monitor;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Cycle, FetchFeed, ParseFeed, Detect, Notify, Trigger }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Cycle => "cycle",
        Phase::FetchFeed => "fetch_feed",
        Phase::ParseFeed => "parse_feed",
        Phase::Detect => "detect",
        Phase::Notify => "notify",
        Phase::Trigger => "trigger_refresh",
    }}
    fn span(&self) -> Span { match self {
        Phase::Cycle => info_span!("cycle"),
        Phase::FetchFeed => info_span!("fetch_feed"),
        Phase::ParseFeed => info_span!("parse_feed"),
        Phase::Detect => info_span!("detect"),
        Phase::Notify => info_span!("notify"),
        Phase::Trigger => info_span!("trigger_refresh"),
    }}
}

impl OpMarker for Monitor {
    const NAME: &'static str = "monitor";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("monitor") }
}
