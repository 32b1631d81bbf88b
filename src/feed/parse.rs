use atom_syndication::Feed;
use chrono::{DateTime, Utc};
use rss::{Channel, Item};

use crate::error::MonitorError;

use super::types::FeedEntry;

/// Parse an activity feed into entries, keeping document order. Atom is tried
/// first; a document that is not Atom gets a second chance as RSS 2.0.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedEntry>, MonitorError> {
    let atom_err = match Feed::read_from(xml) {
        Ok(feed) => return Ok(feed.entries().iter().map(entry_from_atom).collect()),
        Err(e) => e,
    };
    match Channel::read_from(xml) {
        Ok(channel) => Ok(channel.items().iter().map(entry_from_rss).collect()),
        Err(_) => Err(MonitorError::parse("feed", atom_err.to_string())),
    }
}

fn entry_from_atom(entry: &atom_syndication::Entry) -> FeedEntry {
    let published = entry.published().unwrap_or(entry.updated()).with_timezone(&Utc);
    FeedEntry::new(entry.title().value.clone(), entry.id(), Some(published))
}

fn entry_from_rss(item: &Item) -> FeedEntry {
    let id = item.guid().map(|g| g.value().to_string())
        .or_else(|| item.link().map(|l| l.to_string()))
        .unwrap_or_default();
    FeedEntry::new(item.title().unwrap_or(""), id, extract_published_at(item))
}

pub fn extract_published_at(item: &Item) -> Option<DateTime<Utc>> {
    if let Some(pub_date) = item.pub_date() {
        if let Ok(dt) = DateTime::parse_from_rfc2822(pub_date) { return Some(dt.with_timezone(&Utc)); }
    }
    // Dublin Core date (RFC3339)
    if let Some(dc) = item.dublin_core_ext() {
        if let Some(first) = dc.dates().first() {
            if let Ok(dt) = DateTime::parse_from_rfc3339(first) { return Some(dt.with_timezone(&Utc)); }
        }
    }
    None
}
