use anyhow::Result;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{info, debug, warn, error, Span};

use crate::error::StageFailure;
use crate::output::{self, types::Envelope};

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

pub struct LogCtx<O: OpMarker> {
    pub(crate) json: bool,
    pub(crate) _marker: PhantomData<O>,
}

impl<O: OpMarker> LogCtx<O> {
    fn op_name(&self) -> &'static str { O::NAME }

    pub fn root_span(&self) -> Span { O::root_span() }

    pub fn root_span_kv<'a, T>(&self, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.root_span();
        let details = kv_to_string(fields);
        if details.is_empty() {
            info!(op = %self.op_name(), "start");
        } else {
            info!(op = %self.op_name(), details = %details, "start");
        }
        span
    }

    pub fn span(&self, ph: &O::Phase) -> Span { ph.span() }

    pub fn span_kv<'a, T>(&self, ph: &O::Phase, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.span(ph);
        let details = kv_to_string(fields);
        if details.is_empty() {
            debug!(op = %self.op_name(), phase = ph.name(), "span_start");
        } else {
            debug!(op = %self.op_name(), phase = ph.name(), details = %details, "span_start");
        }
        span
    }

    pub fn info(&self, msg: impl AsRef<str>) { if self.json { info!(op = %self.op_name(), "{}", msg.as_ref()); } else { info!("{}", msg.as_ref()); } }
    pub fn debug(&self, msg: impl AsRef<str>) { if self.json { debug!(op = %self.op_name(), "{}", msg.as_ref()); } else { debug!("{}", msg.as_ref()); } }
    pub fn warn(&self, msg: impl AsRef<str>) { if self.json { warn!(op = %self.op_name(), "{}", msg.as_ref()); } else { warn!("{}", msg.as_ref()); } }

    pub fn info_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); info!(op = %self.op_name(), details = %details, "{}", msg); }
        else { info!("{}", msg); }
    }

    pub fn error_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); error!(op = %self.op_name(), details = %details, "{}", msg); }
        else { error!("{}", msg); }
    }

    /// The error-observation sink: every caught stage failure ends up here,
    /// tagged with the stage and the input it choked on.
    pub fn stage_failure(&self, failure: &StageFailure) {
        if self.json {
            error!(op = %self.op_name(), stage = failure.stage.name(), input = %failure.input, error = %failure.error, "stage_failed");
        } else {
            error!("❌ {} failed on {}: {}", failure.stage, failure.input, failure.error);
        }
    }

    pub fn result<T: Serialize>(&self, result: &T) -> Result<()> {
        let env = Envelope::result(self.op_name(), result, None)?;
        output::emit(&env)?;
        Ok(())
    }
}

impl LogCtx<crate::telemetry::ops::monitor::Monitor> {
    pub fn cycle_summary(&self, entries: usize, new_items: usize, notified: usize, failures: usize) {
        if self.json { info!(op = %self.op_name(), entries, new_items, notified, failures, "cycle_summary"); }
        else { info!("🔁 Poll cycle: entries={} new={} notified={} failures={}", entries, new_items, notified, failures); }
    }
}

impl LogCtx<crate::telemetry::ops::aggregate::Aggregate> {
    pub fn refresh_summary(&self, repositories: usize, records: usize, failed: usize) {
        if self.json { info!(op = %self.op_name(), repositories, records, failed, "refresh_summary"); }
        else { info!("📋 Snapshot refreshed: repositories={} merge_requests={} failed={}", repositories, records, failed); }
    }
}

fn kv_to_string<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    let mut parts: Vec<String> = Vec::new();
    for (k, v) in kv { parts.push(format!("{}={}", k, v)); }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_pairs_are_space_joined() {
        let s = kv_to_string([("url", "http://h".to_string()), ("n", 3.to_string())]);
        assert_eq!(s, "url=http://h n=3");
        assert_eq!(kv_to_string(Vec::<(&str, String)>::new()), "");
    }
}
