use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Dispatch;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Command }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Command => "command" } }
    fn span(&self) -> Span { match self { Phase::Command => info_span!("command") } }
}

impl OpMarker for Dispatch {
    const NAME: &'static str = "dispatch";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("dispatch") }
}
