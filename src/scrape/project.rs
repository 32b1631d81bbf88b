use scraper::Html;

use crate::error::MonitorError;

use super::{clean_text, selector};

/// Repository names on a project page: the first heading link inside each
/// `.repository-info` block.
pub fn scrape_repositories(html: &str) -> Result<Vec<String>, MonitorError> {
    let doc = Html::parse_document(html);
    let block_sel = selector(".repository-info")?;
    let link_sel = selector("h1 a, h2 a, h3 a, h4 a, h5 a, h6 a")?;

    let mut repositories = Vec::new();
    for (idx, block) in doc.select(&block_sel).enumerate() {
        let link = block.select(&link_sel).next().ok_or_else(|| {
            MonitorError::parse("project page", format!("repository block {} has no heading link", idx + 1))
        })?;
        let name = clean_text(link);
        if name.is_empty() {
            return Err(MonitorError::parse("project page", format!("repository block {} has an empty name", idx + 1)));
        }
        repositories.push(name);
    }
    Ok(repositories)
}
