use regex::Regex;

use crate::config::urls;
use crate::error::MonitorError;

use super::types::FeedEntry;

const TRIGGER: &str = "merge request";
const NOISE: &str = "commented";

/// Turns feed entries into chat lines for one project.
#[derive(Clone, Debug)]
pub struct MessageFormatter {
    host: String,
    project: String,
    link: Regex,
}

impl MessageFormatter {
    pub fn new(host: &str, project: &str) -> Result<Self, MonitorError> {
        // `regex::escape` keeps project names like `qt.project` literal.
        let pattern = format!(r"^.*?merge request {}/(\S+)\s*#(\d+)", regex::escape(project));
        let link = Regex::new(&pattern).map_err(|e| MonitorError::parse("link pattern", e.to_string()))?;
        Ok(Self { host: host.to_string(), project: project.to_string(), link })
    }

    /// `None` when the entry is not worth a notification: only merge request
    /// events count, and comments on them are dropped. Case-sensitive substring
    /// checks, so a title carrying both phrases is suppressed.
    pub fn format(&self, entry: &FeedEntry) -> Option<String> {
        let title = entry.title.as_str();
        if !title.contains(TRIGGER) || title.contains(NOISE) { return None; }

        let decoded = html_escape::decode_html_entities(title);
        Some(self.rewrite_link(&decoded))
    }

    // Best effort: a title the pattern does not recognize goes out unchanged.
    fn rewrite_link(&self, title: &str) -> String {
        let Some(caps) = self.link.captures(title) else { return title.to_string() };
        let (Some(whole), Some(repo), Some(id)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            return title.to_string();
        };
        let url = urls::merge_request_url(&self.host, &self.project, repo.as_str(), id.as_str());
        let rest = title[whole.end()..].trim_start();
        format!("{url} {rest}")
    }
}
