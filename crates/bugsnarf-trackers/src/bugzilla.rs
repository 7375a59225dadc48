//! Bugzilla and Issuezilla adapters plus Bugzilla self-discovery.

use crate::bug_report::BugReport;
use crate::http_transport::HttpTransport;
use crate::tracker::{fetch_tracker_page, Tracker, TrackerKind};
use crate::tracker_error::TrackerError;
use crate::xml_tree::{parse_xml_document, XmlNode};

pub fn bugzilla_xml_url(tracker: &Tracker, id: u64) -> String {
    format!("{}/xml.cgi?id={id}", tracker.url)
}

pub fn show_bug_url(tracker: &Tracker, id: u64) -> String {
    format!("{}/show_bug.cgi?id={id}", tracker.url)
}

pub(crate) async fn fetch_bugzilla(
    http: &HttpTransport,
    tracker: &Tracker,
    id: u64,
) -> Result<BugReport, TrackerError> {
    let url = bugzilla_xml_url(tracker, id);
    let body = fetch_tracker_page(http, tracker, &url, &[404]).await?;
    parse_bugzilla_xml(tracker, id, &url, &body)
}

pub(crate) async fn fetch_issuezilla(
    http: &HttpTransport,
    tracker: &Tracker,
    id: u64,
) -> Result<BugReport, TrackerError> {
    let url = bugzilla_xml_url(tracker, id);
    let body = fetch_tracker_page(http, tracker, &url, &[404]).await?;
    parse_issuezilla_xml(tracker, id, &url, &body)
}

/// Maps a Bugzilla `xml.cgi` document onto a [`BugReport`].
///
/// `request_url` is only used for error diagnostics.
pub fn parse_bugzilla_xml(
    tracker: &Tracker,
    id: u64,
    request_url: &str,
    xml: &str,
) -> Result<BugReport, TrackerError> {
    let document = parse_xml_document(xml)
        .map_err(|error| TrackerError::protocol(&tracker.description, error, request_url))?;
    let bug = document
        .find("bug")
        .ok_or_else(|| TrackerError::protocol(&tracker.description, "missing bug element", request_url))?;

    match bug.attribute("error") {
        None | Some("") => {}
        Some("NotFound") | Some("InvalidBugId") => return Err(TrackerError::NotFound),
        Some("NotPermitted") => {
            return Err(TrackerError::Private {
                public_url: show_bug_url(tracker, id),
            })
        }
        Some(other) => {
            return Err(TrackerError::protocol(
                &tracker.description,
                format!("error getting bug: {other}"),
                request_url,
            ))
        }
    }

    let field = |name: &str| required_text(bug, name, tracker, request_url);
    let title = field("short_desc")?;
    let status = with_resolution(field("bug_status")?, bug.child_text("resolution"));
    let product = field("component")?;
    let severity = field("bug_severity")?;
    Ok(BugReport::new(id, title, &severity, &status, show_bug_url(tracker, id))
        .with_product(Some(product))
        .with_assignee(bug.child_text("assigned_to")))
}

/// Maps an Issuezilla `xml.cgi` document onto a [`BugReport`].
pub fn parse_issuezilla_xml(
    tracker: &Tracker,
    id: u64,
    request_url: &str,
    xml: &str,
) -> Result<BugReport, TrackerError> {
    let document = parse_xml_document(xml)
        .map_err(|error| TrackerError::protocol(&tracker.description, error, request_url))?;
    let issue = document
        .find("issue")
        .ok_or_else(|| TrackerError::protocol(&tracker.description, "missing issue element", request_url))?;

    let status_code = issue.attribute("status_code").unwrap_or("200");
    if status_code != "200" {
        return match issue.attribute("status_message") {
            Some("NotFound") => Err(TrackerError::NotFound),
            message => Err(TrackerError::protocol(
                &tracker.description,
                format!(
                    "error getting issue: {} {}",
                    status_code,
                    message.unwrap_or_default()
                ),
                request_url,
            )),
        };
    }

    let field = |name: &str| required_text(issue, name, tracker, request_url);
    let title = field("short_desc")?;
    let status = with_resolution(field("issue_status")?, issue.child_text("resolution"));
    let product = field("component")?;
    let severity = field("issue_type")?;
    Ok(BugReport::new(id, title, &severity, &status, show_bug_url(tracker, id))
        .with_product(Some(product))
        .with_assignee(issue.child_text("assigned_to")))
}

fn required_text(
    node: &XmlNode,
    name: &str,
    tracker: &Tracker,
    request_url: &str,
) -> Result<String, TrackerError> {
    node.child_text(name).ok_or_else(|| {
        TrackerError::protocol(&tracker.description, format!("missing {name}"), request_url)
    })
}

fn with_resolution(status: String, resolution: Option<String>) -> String {
    match resolution {
        Some(resolution) if !resolution.is_empty() => format!("{status}: {resolution}"),
        _ => status,
    }
}

/// Extracts the canonical base URL a Bugzilla instance advertises in its
/// `xml.cgi` root element and builds an unregistered tracker for it.
pub fn parse_bugzilla_urlbase(xml: &str) -> Option<Tracker> {
    let document = parse_xml_document(xml).ok()?;
    let root = document.find("bugzilla")?;
    let urlbase = root.attribute("urlbase")?.trim().trim_end_matches('/');
    let host = urlbase.split_once("://").map_or(urlbase, |(_, rest)| rest);
    let host = host.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return None;
    }
    Some(Tracker::new(host, TrackerKind::Bugzilla, urlbase, host))
}

pub(crate) async fn discover_bugzilla(http: &HttpTransport, show_bug_url: &str) -> Option<Tracker> {
    if !show_bug_url.contains("show_bug.cgi") {
        return None;
    }
    let xml_url = show_bug_url.replacen("show_bug", "xml", 1);
    let response = match http.get_text(&xml_url).await {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            tracing::debug!(url = %xml_url, status = response.status, "bugzilla discovery rejected");
            return None;
        }
        Err(error) => {
            tracing::debug!(url = %xml_url, %error, "bugzilla discovery failed");
            return None;
        }
    };
    let tracker = parse_bugzilla_urlbase(&response.body)?;
    tracing::info!(tracker = %tracker.name, url = %tracker.url, "discovered bugzilla instance");
    Some(tracker)
}
