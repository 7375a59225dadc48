//! Page-scraping adapters for trackers without a structured export:
//! Sourceforge item pages, WikiForms, and STR.

use std::sync::LazyLock;

use regex::Regex;

use crate::bug_report::BugReport;
use crate::http_transport::HttpTransport;
use crate::tracker::{fetch_tracker_page, Tracker};
use crate::tracker_error::TrackerError;

static SOURCEFORGE_ITEM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<h2>\[.*?\]\s*(?P<title>.*?)</h2>.*?assigned.*?<br>\s+(?P<assignee>\S+).*?priority.*?(?P<priority>\d+).*?status.*?<br>\s+(?P<status>\S+).*?resolution.*?<br>\s+(?P<resolution>\S+)",
    )
    .expect("sourceforge item regex")
});

/// Removes every `<...>` tag, keeping the text between them.
pub fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Text between the first `start` marker and the next `end` marker.
fn between<'a>(line: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = line.find(start)? + start.len();
    let rest = &line[from..];
    let to = rest.find(end).unwrap_or(rest.len());
    Some(rest[..to].trim())
}

pub fn sourceforge_item_url(template: &str, id: u64) -> String {
    template.replace("{id}", &id.to_string())
}

pub(crate) async fn fetch_sourceforge(
    http: &HttpTransport,
    item_url_template: &str,
    tracker: &Tracker,
    id: u64,
) -> Result<BugReport, TrackerError> {
    let url = sourceforge_item_url(item_url_template, id);
    let page = fetch_tracker_page(http, tracker, &url, &[404]).await?;
    parse_sourceforge_item(id, &url, &page)
}

/// A page that does not match the item layout is treated as a missing
/// item; Sourceforge serves a generic page for unknown ids.
pub fn parse_sourceforge_item(id: u64, url: &str, page: &str) -> Result<BugReport, TrackerError> {
    let captures = SOURCEFORGE_ITEM_REGEX
        .captures(page)
        .ok_or(TrackerError::NotFound)?;
    let group = |name: &str| captures.name(name).map_or("", |m| m.as_str()).trim();
    let resolution = group("resolution");
    let mut status = group("status").to_string();
    if !resolution.eq_ignore_ascii_case("none") {
        status = format!("{status} {resolution}");
    }
    let severity = format!("Pri: {}", group("priority"));
    Ok(
        BugReport::new(id, strip_tags(group("title")), &severity, &status, url)
            .with_assignee(Some(group("assignee").to_string())),
    )
}

pub(crate) async fn fetch_wikiforms(
    http: &HttpTransport,
    tracker: &Tracker,
    id: u64,
) -> Result<BugReport, TrackerError> {
    let url = format!("{}/{id:05}", tracker.url);
    let page = fetch_tracker_page(http, tracker, &url, &[404]).await?;
    parse_wikiforms_page(tracker, id, &url, &page)
}

/// Reads the `<dt>field</dt> <dd>value</dd>` lines of a WikiForms bug page.
pub fn parse_wikiforms_page(
    tracker: &Tracker,
    id: u64,
    url: &str,
    page: &str,
) -> Result<BugReport, TrackerError> {
    let mut title = None;
    let mut status = None;
    let mut severity = None;
    let mut product = None;
    for line in page.lines() {
        let lowered = line.to_ascii_lowercase();
        let value = || line.find("<dd>").map(|index| strip_tags(&line[index..]));
        if lowered.contains("<dt>importance</dt>") {
            severity = value().map(|value| format!("Importance {value}"));
        } else if lowered.contains("<dt>summary</dt>") {
            title = value();
        } else if lowered.contains("<dt>status</dt>") {
            status = value();
        } else if lowered.contains("<dt>category</dt>") {
            product = value();
        }
    }
    let missing =
        |field: &str| TrackerError::protocol(&tracker.description, format!("missing {field}"), url);
    let title = title.ok_or_else(|| missing("summary"))?;
    let status = status.ok_or_else(|| missing("status"))?;
    let severity = severity.ok_or_else(|| missing("importance"))?;
    let product = product.ok_or_else(|| missing("category"))?;
    Ok(BugReport::new(id, title, &severity, &status, url).with_product(Some(product)))
}

pub(crate) async fn fetch_str(
    http: &HttpTransport,
    tracker: &Tracker,
    id: u64,
) -> Result<BugReport, TrackerError> {
    let url = format!("{}?L{id}", tracker.url);
    let page = fetch_tracker_page(http, tracker, &url, &[404]).await?;
    parse_str_page(tracker, id, &url, &page)
}

/// Reads the one-row-per-field table of an STR (Software Trouble Report)
/// page.
pub fn parse_str_page(
    tracker: &Tracker,
    id: u64,
    url: &str,
    page: &str,
) -> Result<BugReport, TrackerError> {
    let mut title = None;
    let mut status = None;
    let mut severity = None;
    let mut product = None;
    let mut assignee = None;
    for line in page.lines() {
        let lowered = line.to_ascii_lowercase();
        if lowered.contains("nowrap>priority:</th>") {
            severity = between(line, " - ", "</td>")
                .map(|value| value.split(',').next().unwrap_or(value).trim())
                .map(|value| format!("Priority {value}"));
        } else if lowered.contains(">application:</th>") {
            product = between(line, "<td>", "</td>").map(str::to_string);
        } else if lowered.contains("nowrap>status:</th>") {
            status = between(line, " - ", "</td>").map(str::to_string);
        } else if lowered.contains("nowrap>summary:</th>") {
            title = between(line, "<td>", "</td>").map(str::to_string);
        } else if lowered.contains("nowrap>assigned to:</th>") {
            assignee = between(line, "<td>", "</td>").map(|value| match strip_tags(value) {
                unassigned if unassigned == "Unassigned" => "nobody".to_string(),
                name => name,
            });
        }
    }
    let missing =
        |field: &str| TrackerError::protocol(&tracker.description, format!("missing {field}"), url);
    let title = title.ok_or_else(|| missing("summary"))?;
    let status = status.ok_or_else(|| missing("status"))?;
    let severity = severity.ok_or_else(|| missing("priority"))?;
    let product = product.ok_or_else(|| missing("application"))?;
    Ok(BugReport::new(id, title, &severity, &status, url)
        .with_product(Some(product))
        .with_assignee(assignee))
}

#[cfg(test)]
mod tests {
    use super::{parse_sourceforge_item, parse_str_page, parse_wikiforms_page, strip_tags};
    use crate::tracker::{Tracker, TrackerKind};
    use crate::tracker_error::TrackerError;

    #[test]
    fn unit_strip_tags_keeps_text_only() {
        assert_eq!(strip_tags("<dd><b>High</b> </dd>"), "High");
        assert_eq!(strip_tags("plain"), "plain");
    }

    #[test]
    fn functional_sourceforge_item_page_maps_fields() {
        let page = "<h2>[ 1234567 ] Plugin crashes on reload</h2>\n\
<b>Assigned To:</b><br>\n  jemfinch\n\
<b>Priority:</b><br>\n  5\n\
<b>Status:</b><br>\n  Closed\n\
<b>Resolution:</b><br>\n  Fixed\n";
        let report = parse_sourceforge_item(1234567, "http://sf.net/x?aid=1234567", page)
            .expect("report");
        assert_eq!(report.title, "Plugin crashes on reload");
        assert_eq!(report.assignee.as_deref(), Some("jemfinch"));
        assert_eq!(report.severity, "Pri: 5");
        assert_eq!(report.status, "Closed fixed");
        assert_eq!(report.product, None);
    }

    #[test]
    fn regression_sourceforge_resolution_none_is_not_appended() {
        let page = "<h2>[ 1 ] Open item</h2> assigned <br> nobody priority 9 status <br> Open resolution <br> None";
        let report = parse_sourceforge_item(1, "u", page).expect("report");
        assert_eq!(report.status, "Open");
        assert_eq!(
            parse_sourceforge_item(1, "u", "<html>no such item</html>"),
            Err(TrackerError::NotFound)
        );
    }

    #[test]
    fn functional_wikiforms_page_reads_definition_lines() {
        let tracker = Tracker::new(
            "gnewsense",
            TrackerKind::Wikiforms,
            "http://bugs.gnewsense.org/Bugs",
            "gNewSense",
        );
        let page = "<dl>\n<dt>Summary</dt> <dd>Kernel panics</dd>\n<dt>Status</dt> <dd>open</dd>\n\
<dt>Importance</dt> <dd><b>high</b></dd>\n<dt>Category</dt> <dd>kernel</dd>\n</dl>";
        let report = parse_wikiforms_page(&tracker, 7, "u", page).expect("report");
        assert_eq!(report.title, "Kernel panics");
        assert_eq!(report.severity, "Importance high");
        assert_eq!(report.product.as_deref(), Some("kernel"));

        assert!(matches!(
            parse_wikiforms_page(&tracker, 7, "u", "<dt>Summary</dt> <dd>x</dd>"),
            Err(TrackerError::Protocol { .. })
        ));
    }

    #[test]
    fn functional_str_page_reads_table_rows() {
        let tracker = Tracker::new("cups", TrackerKind::Str, "http://www.cups.org/str.php", "CUPS");
        let page = "<tr><th align='right' nowrap>Status:</th><td>2 - Closed w/Resolution</td></tr>\n\
<tr><th align='right' nowrap>Priority:</th><td>4 - High, Multiple Users</td></tr>\n\
<tr><th align='right'>Application:</th><td>CUPS</td></tr>\n\
<tr><th align='right' nowrap>Summary:</th><td>lpstat hangs</td></tr>\n\
<tr><th align='right' nowrap>Assigned To:</th><td><a href='x'>Unassigned</a></td></tr>\n";
        let report = parse_str_page(&tracker, 3456, "u", page).expect("report");
        assert_eq!(report.severity, "Priority high");
        assert_eq!(report.status, "Closed w/resolution");
        assert_eq!(report.product.as_deref(), Some("CUPS"));
        assert_eq!(report.title, "lpstat hangs");
        assert_eq!(report.assignee.as_deref(), Some("nobody"));
    }
}
