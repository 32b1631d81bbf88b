use chrono::{DateTime, Utc};
use serde::Serialize;

/// One open merge request as listed on a repository's overview page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeRequestRecord {
    pub id: String,
    pub status: String,
    pub summary: String,
    pub target_branch: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    /// Filled in by the aggregator; empty straight out of the scraper.
    pub repository: String,
}

impl MergeRequestRecord {
    /// `{repository}/{id}: - {status} - {summary}`
    pub fn list_line(&self) -> String {
        format!("{}/{}: - {} - {}", self.repository, self.id, self.status, self.summary)
    }
}
