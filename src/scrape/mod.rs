//! Extraction of authoritative merge-request state from the hosting site's
//! HTML pages.

mod merge_requests;
mod project;
pub mod types;

pub use merge_requests::scrape_merge_requests;
pub use project::scrape_repositories;
pub use types::MergeRequestRecord;

use scraper::Selector;

use crate::error::MonitorError;

fn selector(css: &str) -> Result<Selector, MonitorError> {
    Selector::parse(css).map_err(|e| MonitorError::parse(format!("selector `{css}`"), format!("{e:?}")))
}

// Text of an element with runs of whitespace collapsed and the ends trimmed.
fn clean_text(el: scraper::ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}
