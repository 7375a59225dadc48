//! Launchpad OOPS reports and CVE identifiers mentioned in chat.

use std::sync::LazyLock;

use regex::Regex;

use crate::entity_decode::decode_entities;
use crate::html_scrapers::strip_tags;
use crate::http_transport::HttpTransport;
use crate::tracker_error::TrackerError;

pub const DEFAULT_OOPS_URL: &str = "https://lp-oops.canonical.com/oops.py/?oopsid={id}";
pub const DEFAULT_CVE_LOOKUP_URL: &str = "https://cve.mitre.org/cgi-bin/cvename.cgi";

static OOPS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOOPS-([0-9A-Z]+)").expect("oops regex"));

static CVE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcve[- ]\d{4}[- ]\d{4,}").expect("cve regex"));

static CVE_DESCRIPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<th.*?Description.*?<td.*?>(.*?)\s*</td>").expect("cve description regex")
});

/// OOPS ids in `text`. `OOPS-tools` is a project name, not a report.
pub fn parse_oops_ids(text: &str) -> Vec<String> {
    OOPS_REGEX
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
        .filter(|id| !id.eq_ignore_ascii_case("tools"))
        .collect()
}

pub fn oops_url(id: &str) -> String {
    DEFAULT_OOPS_URL.replace("{id}", id)
}

/// CVE ids in `text`, normalized to `CVE-YYYY-NNNN` and deduplicated.
pub fn parse_cve_ids(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for found in CVE_REGEX.find_iter(text) {
        let id = found.as_str().replace(' ', "-").to_ascii_uppercase();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Description cell of a CVE detail page, flattened to one line of text.
pub fn parse_cve_description(page: &str) -> Option<String> {
    let cell = CVE_DESCRIPTION_REGEX.captures(page)?.get(1)?.as_str();
    let text = decode_entities(&strip_tags(&cell.replace(['\r', '\n'], " ")));
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CveSummary {
    pub id: String,
    pub description: String,
    pub url: String,
}

impl CveSummary {
    pub fn line(&self) -> String {
        format!("{} ({})", self.description, self.url)
    }
}

pub fn cve_page_url(lookup_url: &str, id: &str) -> String {
    format!("{lookup_url}?name={id}")
}

/// `Ok(None)` when the page carries no description, e.g. an unassigned id.
pub(crate) async fn fetch_cve_summary(
    http: &HttpTransport,
    lookup_url: &str,
    id: &str,
) -> Result<Option<CveSummary>, TrackerError> {
    let url = cve_page_url(lookup_url, id);
    let response = http
        .get_text(&url)
        .await
        .map_err(|error| TrackerError::protocol("CVE", error, url.as_str()))?;
    if !response.is_success() {
        return Err(TrackerError::protocol(
            "CVE",
            format!("HTTP status {}", response.status),
            url,
        ));
    }
    Ok(parse_cve_description(&response.body).map(|description| CveSummary {
        id: id.to_string(),
        description,
        url,
    }))
}
