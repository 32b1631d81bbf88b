use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Chat;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Session }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Session => "session" } }
    fn span(&self) -> Span { match self { Phase::Session => info_span!("session") } }
}

impl OpMarker for Chat {
    const NAME: &'static str = "chat";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("chat") }
}
