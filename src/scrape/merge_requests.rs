use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::{ElementRef, Html};

use crate::error::MonitorError;

use super::types::MergeRequestRecord;
use super::{clean_text, selector};

const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Rows of the first table on a merge-request overview page.
///
/// Columns, positionally: id (`#127`), status, summary (link), target branch,
/// creator (link), created-at (`abbr[title]`, ISO-8601 UTC). Any row that
/// lacks one of these fails the whole page. Only the table's own rows and
/// cells count; tables nested inside a cell are part of that cell's content.
pub fn scrape_merge_requests(html: &str) -> Result<Vec<MergeRequestRecord>, MonitorError> {
    let doc = Html::parse_document(html);
    let table_sel = selector("table")?;

    let Some(table) = doc.select(&table_sel).next() else {
        return Err(MonitorError::parse("merge request page", "no table"));
    };

    let mut records = Vec::new();
    let rows = children_named(table, "tbody").flat_map(|body| children_named(body, "tr"));
    for (idx, row) in rows.enumerate() {
        let cells: Vec<ElementRef<'_>> = children_named(row, "td").collect();
        records.push(parse_row(idx + 1, &cells)?);
    }
    Ok(records)
}

fn children_named<'a>(parent: ElementRef<'a>, name: &'static str) -> impl Iterator<Item = ElementRef<'a>> {
    parent.children().filter_map(ElementRef::wrap).filter(move |e| e.value().name() == name)
}

fn parse_row(n: usize, cells: &[ElementRef<'_>]) -> Result<MergeRequestRecord, MonitorError> {
    if cells.len() < 6 {
        return Err(row_error(n, format!("expected 6 columns, found {}", cells.len())));
    }

    let id = clean_text(link(n, cells[0], "id")?).trim_start_matches('#').to_string();
    let status = clean_text(cells[1]);
    let summary = clean_text(link(n, cells[2], "summary")?);
    let target_branch = clean_text(cells[3]);
    let creator = clean_text(link(n, cells[4], "creator")?);

    let abbr_sel = selector("abbr[title]")?;
    let stamp = cells[5].select(&abbr_sel).next()
        .and_then(|a| a.value().attr("title"))
        .ok_or_else(|| row_error(n, "created-at column has no timestamp"))?;
    let created_at = parse_created_at(stamp).ok_or_else(|| row_error(n, format!("bad timestamp `{stamp}`")))?;

    if id.is_empty() { return Err(row_error(n, "empty id")); }

    Ok(MergeRequestRecord { id, status, summary, target_branch, creator, created_at, repository: String::new() })
}

fn link<'a>(n: usize, cell: ElementRef<'a>, column: &str) -> Result<ElementRef<'a>, MonitorError> {
    let a_sel = selector("a")?;
    cell.select(&a_sel).next().ok_or_else(|| row_error(n, format!("{column} column has no link")))
}

fn parse_created_at(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), CREATED_AT_FORMAT).ok().map(|dt| dt.and_utc())
}

fn row_error(n: usize, reason: impl Into<String>) -> MonitorError {
    MonitorError::parse(format!("merge request row {n}"), reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ROW_127: &str = r##"<tr>
      <td><a href="/maliit/maliit-framework/merge_requests/127">#127</a></td>
      <td style="color:#0080ff"> New      </td>
      <td><a href="/maliit/maliit-framework/merge_requests/127">Allow X </a> </td>
      <td>master</td>
      <td><a href="/~mikhas">mikhas</a></td>
      <td><abbr class="timeago" title="2011-12-17T15:35:14Z">2011-12-17 15:35:14 UTC</abbr></td>
    </tr>"##;

    fn page(rows: &str) -> String {
        format!(r#"<html><body><table><thead><tr><th>ID</th><th>Status</th><th>Summary</th><th>Target</th><th>Creator</th><th>Age</th></tr></thead>
        <tbody>{rows}</tbody></table><table><tbody><tr><td>ignored</td></tr></tbody></table></body></html>"#)
    }

    #[test]
    fn scrapes_one_row() {
        let records = scrape_merge_requests(&page(ROW_127)).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.id, "127");
        assert_eq!(r.status, "New");
        assert_eq!(r.summary, "Allow X");
        assert_eq!(r.target_branch, "master");
        assert_eq!(r.creator, "mikhas");
        assert_eq!(r.created_at, Utc.with_ymd_and_hms(2011, 12, 17, 15, 35, 14).unwrap());
        assert_eq!(r.repository, "");
    }

    #[test]
    fn keeps_row_order() {
        let second = ROW_127.replace("#127", "#130").replace("Allow X", "Fix Y");
        let records = scrape_merge_requests(&page(&format!("{ROW_127}{second}"))).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["127", "130"]);
    }

    #[test]
    fn empty_table_has_no_records() {
        assert!(scrape_merge_requests(&page("")).unwrap().is_empty());
    }

    #[test]
    fn missing_table_fails() {
        assert!(scrape_merge_requests("<html><body>gone</body></html>").unwrap_err().is_parse());
    }

    #[test]
    fn short_row_fails_the_page() {
        let err = scrape_merge_requests(&page(&format!("{ROW_127}<tr><td colspan=\"6\">No more</td></tr>"))).unwrap_err();
        assert!(format!("{err}").contains("merge request row 2"));
    }

    #[test]
    fn bad_timestamp_fails() {
        let row = ROW_127.replace("2011-12-17T15:35:14Z", "yesterday");
        assert!(scrape_merge_requests(&page(&row)).unwrap_err().is_parse());
    }

    #[test]
    fn nested_table_in_a_cell_is_cell_content() {
        let row = ROW_127.replace(
            r#"<a href="/~mikhas">mikhas</a>"#,
            r#"<a href="/~mikhas">mikhas</a><table><tr><td>badge</td></tr></table>"#,
        );
        let records = scrape_merge_requests(&page(&row)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].creator, "mikhas");
        assert_eq!(records[0].created_at, Utc.with_ymd_and_hms(2011, 12, 17, 15, 35, 14).unwrap());
    }

    #[test]
    fn list_line_format() {
        let mut r = scrape_merge_requests(&page(ROW_127)).unwrap().remove(0);
        r.repository = "maliit-framework".into();
        assert_eq!(r.list_line(), "maliit-framework/127: - New - Allow X");
    }
}
