//! Launchpad adapter: the JSON web service when enabled, otherwise the
//! anonymous `+text` export. Both follow duplicate chains.

use mailparse::{parse_headers, MailHeaderMap};
use serde::{Deserialize, Serialize};

use crate::bug_report::BugReport;
use crate::http_transport::HttpTransport;
use crate::launchpad_tasks::{select_primary_index, strip_target_qualifier, LaunchpadTask};
use crate::tracker::{fetch_tracker_page, Tracker};
use crate::tracker_error::TrackerError;

pub const DEFAULT_LAUNCHPAD_API_BASE: &str = "https://api.launchpad.net/1.0";
/// Longest duplicate chain followed before giving up.
pub const MAX_DUPLICATE_DEPTH: usize = 10;
const PRIVATE_BUG_SENTINEL: &str = "<!-- 4a. didn't try to log in last time: -->";
const LARGE_BUG_CAUSE: &str = "not reporting large bug";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchpadMode {
    #[default]
    Api,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchpadOptions {
    #[serde(default)]
    pub mode: LaunchpadMode,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Bugs too large to render; fetching one yields a protocol error.
    #[serde(default = "default_refused_bug_ids")]
    pub refused_bug_ids: Vec<u64>,
}

impl Default for LaunchpadOptions {
    fn default() -> Self {
        Self {
            mode: LaunchpadMode::default(),
            api_base: default_api_base(),
            refused_bug_ids: default_refused_bug_ids(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_LAUNCHPAD_API_BASE.to_string()
}

fn default_refused_bug_ids() -> Vec<u64> {
    vec![1]
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One bug as read from either Launchpad surface, before task selection.
pub struct LaunchpadBug {
    pub id: u64,
    pub title: String,
    pub duplicate_of: Option<u64>,
    pub tasks: Vec<LaunchpadTask>,
    pub extra: Option<String>,
}

impl LaunchpadBug {
    /// Collapses the bug onto its primary task. Duplicates carry a
    /// `(dup-of: N)` marker in the title.
    pub fn into_report(self, tracker: &Tracker) -> Result<BugReport, TrackerError> {
        let url = public_bug_url(tracker, self.id);
        let Some(index) = select_primary_index(&self.tasks) else {
            return Err(TrackerError::protocol(&tracker.description, "bug has no tasks", url));
        };
        let task = &self.tasks[index];
        let title = match self.duplicate_of {
            Some(duplicate) => format!("{} (dup-of: {duplicate})", self.title),
            None => self.title.clone(),
        };
        Ok(BugReport::new(self.id, title, &task.importance, &task.status, url)
            .with_product(Some(task.target.clone()))
            .with_assignee(task.assignee.clone())
            .with_extra(self.extra.clone()))
    }
}

pub fn public_bug_url(tracker: &Tracker, id: u64) -> String {
    format!("{}/bugs/{id}", tracker.url)
}

/// Fetches `id` and every bug it is transitively marked a duplicate of.
pub(crate) async fn fetch_launchpad(
    http: &HttpTransport,
    options: &LaunchpadOptions,
    tracker: &Tracker,
    id: u64,
) -> Result<Vec<BugReport>, TrackerError> {
    let mut reports = Vec::new();
    let mut next = Some(id);
    while let Some(current) = next {
        if reports.len() >= MAX_DUPLICATE_DEPTH {
            return Err(TrackerError::protocol(
                &tracker.description,
                format!("duplicate chain longer than {MAX_DUPLICATE_DEPTH}"),
                public_bug_url(tracker, id),
            ));
        }
        if options.refused_bug_ids.contains(&current) {
            return Err(TrackerError::protocol(
                &tracker.description,
                LARGE_BUG_CAUSE,
                public_bug_url(tracker, current),
            ));
        }
        let bug = match options.mode {
            LaunchpadMode::Api => fetch_api_bug(http, &options.api_base, tracker, current).await?,
            LaunchpadMode::Text => fetch_text_bug(http, tracker, current).await?,
        };
        next = bug.duplicate_of;
        reports.push(bug.into_report(tracker)?);
    }
    Ok(reports)
}

async fn fetch_text_bug(
    http: &HttpTransport,
    tracker: &Tracker,
    id: u64,
) -> Result<LaunchpadBug, TrackerError> {
    let url = format!("{}/+text", public_bug_url(tracker, id));
    let body = fetch_tracker_page(http, tracker, &url, &[404]).await?;
    if body.contains(PRIVATE_BUG_SENTINEL) {
        return Err(TrackerError::Private {
            public_url: public_bug_url(tracker, id),
        });
    }
    parse_text_export(id, &body)
        .map_err(|cause| TrackerError::protocol(&tracker.description, cause, url))
}

/// Parses the `+text` export: a header block for the bug followed by one
/// header block per task. Non-task blocks (attachments, comments) are
/// skipped, and task targets lose their `(Distribution)` qualifier.
pub fn parse_text_export(id: u64, raw: &str) -> Result<LaunchpadBug, String> {
    let normalized = raw.replace("\r\n", "\n");
    let mut blocks = normalized.split("\n\n").filter(|block| !block.trim().is_empty());
    let bug_block = blocks.next().ok_or_else(|| "empty bug export".to_string())?;
    let (bug_headers, _) = parse_headers(bug_block.trim().as_bytes()).map_err(|error| error.to_string())?;
    let title = bug_headers
        .get_first_value("title")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| "missing title".to_string())?;
    let duplicate_of = bug_headers
        .get_first_value("duplicate-of")
        .and_then(|value| value.trim().parse::<u64>().ok());

    let mut tasks = Vec::new();
    for block in blocks {
        let Ok((headers, _)) = parse_headers(block.trim().as_bytes()) else {
            continue;
        };
        let Some(target) = headers.get_first_value("task") else {
            continue;
        };
        let field = |name: &str| {
            headers
                .get_first_value(name)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };
        tasks.push(LaunchpadTask {
            target: strip_target_qualifier(&target).to_string(),
            status: field("status"),
            importance: field("importance"),
            assignee: Some(field("assignee")).filter(|value| !value.is_empty()),
        });
    }

    Ok(LaunchpadBug {
        id,
        title,
        duplicate_of,
        tasks,
        extra: None,
    })
}

#[derive(Debug, Deserialize)]
struct ApiBug {
    title: String,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    duplicate_of_link: Option<String>,
    #[serde(default)]
    users_affected_count_with_dupes: u64,
    #[serde(default)]
    heat: u64,
    bug_tasks_collection_link: String,
}

#[derive(Debug, Deserialize)]
struct ApiTaskCollection {
    #[serde(default)]
    entries: Vec<ApiTask>,
}

#[derive(Debug, Deserialize)]
struct ApiTask {
    #[serde(default)]
    status: String,
    #[serde(default)]
    importance: String,
    #[serde(default)]
    assignee_link: Option<String>,
    #[serde(default)]
    bug_target_display_name: String,
}

#[derive(Debug, Deserialize)]
struct ApiPerson {
    display_name: String,
    name: String,
}

async fn fetch_api_bug(
    http: &HttpTransport,
    api_base: &str,
    tracker: &Tracker,
    id: u64,
) -> Result<LaunchpadBug, TrackerError> {
    let bug_url = format!("{}/bugs/{id}", api_base.trim_end_matches('/'));
    let bug: ApiBug = fetch_api_json(http, tracker, id, &bug_url).await?;
    if bug.private {
        return Err(TrackerError::Private {
            public_url: public_bug_url(tracker, id),
        });
    }
    let collection: ApiTaskCollection =
        fetch_api_json(http, tracker, id, &bug.bug_tasks_collection_link).await?;

    let mut tasks = Vec::with_capacity(collection.entries.len());
    let mut assignee_links = Vec::with_capacity(collection.entries.len());
    for entry in collection.entries {
        tasks.push(LaunchpadTask {
            target: entry.bug_target_display_name,
            status: entry.status,
            importance: entry.importance,
            assignee: None,
        });
        assignee_links.push(entry.assignee_link);
    }
    if let Some(index) = select_primary_index(&tasks) {
        if let Some(link) = assignee_links[index].as_deref() {
            let person: ApiPerson = fetch_api_json(http, tracker, id, link).await?;
            tasks[index].assignee = Some(format!("{} ({})", person.display_name, person.name));
        }
    }

    Ok(LaunchpadBug {
        id,
        title: bug.title,
        duplicate_of: bug.duplicate_of_link.as_deref().and_then(link_trailing_id),
        tasks,
        extra: Some(format!(
            "(affected: {}, heat: {})",
            bug.users_affected_count_with_dupes, bug.heat
        )),
    })
}

async fn fetch_api_json<T: serde::de::DeserializeOwned>(
    http: &HttpTransport,
    tracker: &Tracker,
    id: u64,
    url: &str,
) -> Result<T, TrackerError> {
    let response = http
        .get_text(url)
        .await
        .map_err(|error| TrackerError::protocol(&tracker.description, error, url))?;
    match response.status {
        404 => return Err(TrackerError::NotFound),
        401 | 403 => {
            return Err(TrackerError::Private {
                public_url: public_bug_url(tracker, id),
            })
        }
        _ if !response.is_success() => {
            return Err(TrackerError::protocol(
                &tracker.description,
                format!("HTTP status {}", response.status),
                url,
            ))
        }
        _ => {}
    }
    serde_json::from_str(&response.body)
        .map_err(|error| TrackerError::protocol(&tracker.description, error, url))
}

/// `https://api.launchpad.net/1.0/bugs/42` yields 42.
fn link_trailing_id(link: &str) -> Option<u64> {
    link.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}
