use chrono::{DateTime, Utc};
use serde::Serialize;

/// One item of the activity feed. Two entries are the same item only when
/// every field matches, so an edited title counts as a new item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub title: String,
    pub id: String,
    pub published: Option<DateTime<Utc>>,
}

impl FeedEntry {
    pub fn new(title: impl Into<String>, id: impl Into<String>, published: Option<DateTime<Utc>>) -> Self {
        Self { title: title.into(), id: id.into(), published }
    }
}

#[derive(Serialize)]
pub struct FeedCheck {
    pub url: String,
    pub entries: usize,
    pub messages: Vec<String>,
}
