//! Tracker identity, backend kinds, and kind-dispatched fetching.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::advisory_links::{fetch_cve_summary, CveSummary, DEFAULT_CVE_LOOKUP_URL};
use crate::bug_report::BugReport;
use crate::http_transport::{HttpTransport, HttpTransportConfig};
use crate::launchpad::LaunchpadOptions;
use crate::tracker_error::TrackerError;
use crate::{bugzilla, debbugs, html_scrapers, launchpad, mantis, trac};

pub const DEFAULT_DEBBUGS_SOAP_URL: &str = "https://bugs.debian.org/cgi-bin/soap.cgi";
pub const DEFAULT_SOURCEFORGE_ITEM_URL: &str = "http://sf.net/support/tracker.php?aid={id}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Backend families with a fetch adapter.
pub enum TrackerKind {
    Bugzilla,
    Issuezilla,
    Trac,
    Mantis,
    Debbugs,
    Launchpad,
    Sourceforge,
    Wikiforms,
    Str,
}

impl TrackerKind {
    pub const ALL: [TrackerKind; 9] = [
        TrackerKind::Bugzilla,
        TrackerKind::Issuezilla,
        TrackerKind::Trac,
        TrackerKind::Mantis,
        TrackerKind::Debbugs,
        TrackerKind::Launchpad,
        TrackerKind::Sourceforge,
        TrackerKind::Wikiforms,
        TrackerKind::Str,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrackerKind::Bugzilla => "bugzilla",
            TrackerKind::Issuezilla => "issuezilla",
            TrackerKind::Trac => "trac",
            TrackerKind::Mantis => "mantis",
            TrackerKind::Debbugs => "debbugs",
            TrackerKind::Launchpad => "launchpad",
            TrackerKind::Sourceforge => "sourceforge",
            TrackerKind::Wikiforms => "wikiforms",
            TrackerKind::Str => "str",
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackerKind {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        TrackerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| TrackerError::UnknownTrackerKind(raw.trim().to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A configured remote tracker. `name` is the registry key.
pub struct Tracker {
    pub name: String,
    pub url: String,
    pub description: String,
    pub kind: TrackerKind,
}

impl Tracker {
    /// Builds a tracker with the registry's normalization applied: the
    /// name is trimmed and lower-cased, trailing slashes are stripped from
    /// the url, and a blank description falls back to the name.
    pub fn new(name: &str, kind: TrackerKind, url: &str, description: &str) -> Self {
        let name = normalize_tracker_name(name);
        let description = match description.trim() {
            "" => name.clone(),
            value => value.to_string(),
        };
        Self {
            url: url.trim().trim_end_matches('/').to_string(),
            name,
            description,
            kind,
        }
    }

    /// Re-applies [`Tracker::new`] normalization to a record that arrived
    /// from elsewhere, e.g. a deserialized configuration file.
    pub fn normalized(self) -> Self {
        Self::new(&self.name, self.kind, &self.url, &self.description)
    }
}

pub fn normalize_tracker_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[async_trait]
/// Fetch-and-normalize capability over any configured tracker.
pub trait BugFetcher: Send + Sync {
    /// Returns the primary report followed by its resolved duplicate chain.
    async fn fetch(&self, tracker: &Tracker, id: u64) -> Result<Vec<BugReport>, TrackerError>;

    /// Builds an unregistered tracker from a bug-view URL, when the backend
    /// family supports self-description.
    async fn discover(&self, url: &str) -> Option<Tracker> {
        let _ = url;
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerClientConfig {
    pub http: HttpTransportConfig,
    pub launchpad: LaunchpadOptions,
    pub debbugs_soap_url: String,
    /// Item page template; `{id}` is replaced by the bug number.
    pub sourceforge_item_url: String,
    /// CVE detail page; queried as `?name=CVE-YYYY-NNNN`.
    pub cve_lookup_url: String,
}

impl Default for TrackerClientConfig {
    fn default() -> Self {
        Self {
            http: HttpTransportConfig::default(),
            launchpad: LaunchpadOptions::default(),
            debbugs_soap_url: DEFAULT_DEBBUGS_SOAP_URL.to_string(),
            sourceforge_item_url: DEFAULT_SOURCEFORGE_ITEM_URL.to_string(),
            cve_lookup_url: DEFAULT_CVE_LOOKUP_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
/// Network-backed [`BugFetcher`] dispatching on [`TrackerKind`].
pub struct TrackerClient {
    http: HttpTransport,
    config: TrackerClientConfig,
}

impl TrackerClient {
    pub fn new(config: TrackerClientConfig) -> Result<Self, reqwest::Error> {
        let http = HttpTransport::new(config.http.clone())?;
        Ok(Self { http, config })
    }

    pub async fn cve_summary(&self, id: &str) -> Result<Option<CveSummary>, TrackerError> {
        tracing::debug!(cve = id, "fetching cve description");
        fetch_cve_summary(&self.http, &self.config.cve_lookup_url, id).await
    }
}

#[async_trait]
impl BugFetcher for TrackerClient {
    async fn fetch(&self, tracker: &Tracker, id: u64) -> Result<Vec<BugReport>, TrackerError> {
        tracing::debug!(tracker = %tracker.name, kind = %tracker.kind, bug_id = id, "fetching bug");
        let result = match tracker.kind {
            TrackerKind::Bugzilla => bugzilla::fetch_bugzilla(&self.http, tracker, id)
                .await
                .map(|report| vec![report]),
            TrackerKind::Issuezilla => bugzilla::fetch_issuezilla(&self.http, tracker, id)
                .await
                .map(|report| vec![report]),
            TrackerKind::Trac => trac::fetch_trac(&self.http, tracker, id)
                .await
                .map(|report| vec![report]),
            TrackerKind::Mantis => mantis::fetch_mantis(&self.http, tracker, id)
                .await
                .map(|report| vec![report]),
            TrackerKind::Debbugs => {
                debbugs::fetch_debbugs(&self.http, &self.config.debbugs_soap_url, tracker, id)
                    .await
                    .map(|report| vec![report])
            }
            TrackerKind::Launchpad => {
                launchpad::fetch_launchpad(&self.http, &self.config.launchpad, tracker, id).await
            }
            TrackerKind::Sourceforge => html_scrapers::fetch_sourceforge(
                &self.http,
                &self.config.sourceforge_item_url,
                tracker,
                id,
            )
            .await
            .map(|report| vec![report]),
            TrackerKind::Wikiforms => html_scrapers::fetch_wikiforms(&self.http, tracker, id)
                .await
                .map(|report| vec![report]),
            TrackerKind::Str => html_scrapers::fetch_str(&self.http, tracker, id)
                .await
                .map(|report| vec![report]),
        };
        if let Err(TrackerError::Protocol { cause, url, .. }) = &result {
            tracing::warn!(tracker = %tracker.name, bug_id = id, %cause, %url, "tracker protocol failure");
        }
        result
    }

    async fn discover(&self, url: &str) -> Option<Tracker> {
        bugzilla::discover_bugzilla(&self.http, url).await
    }
}

/// GETs a tracker page, mapping transport failures and unexpected statuses
/// onto the error taxonomy. `not_found_statuses` lists the HTTP statuses
/// this backend uses to say "no such bug".
pub(crate) async fn fetch_tracker_page(
    http: &HttpTransport,
    tracker: &Tracker,
    url: &str,
    not_found_statuses: &[u16],
) -> Result<String, TrackerError> {
    let response = http
        .get_text(url)
        .await
        .map_err(|error| TrackerError::protocol(&tracker.description, error, url))?;
    if response.is_success() {
        return Ok(response.body);
    }
    if not_found_statuses.contains(&response.status) {
        return Err(TrackerError::NotFound);
    }
    Err(TrackerError::protocol(
        &tracker.description,
        format!("HTTP status {}", response.status),
        url,
    ))
}

/// The preconfigured tracker set used when no configuration lists any.
pub fn builtin_trackers() -> Vec<Tracker> {
    use TrackerKind::*;
    [
        ("mozilla", Bugzilla, "https://bugzilla.mozilla.org", "Mozilla"),
        ("ubuntu", Launchpad, "https://launchpad.net", "Ubuntu"),
        ("gnome", Bugzilla, "http://bugzilla.gnome.org", "Gnome"),
        ("gnome2", Bugzilla, "http://bugs.gnome.org", "Gnome"),
        ("kde", Bugzilla, "https://bugs.kde.org", "KDE"),
        ("ximian", Bugzilla, "http://bugzilla.ximian.com", "Ximian"),
        ("freedesktop", Bugzilla, "https://bugzilla.freedesktop.org", "Freedesktop"),
        ("freedesktop2", Bugzilla, "https://bugs.freedesktop.org", "Freedesktop"),
        ("openoffice", Issuezilla, "http://openoffice.org/issues", "OpenOffice.org"),
        ("launchpad", Launchpad, "https://launchpad.net", "Launchpad"),
        ("lp", Launchpad, "https://launchpad.net", "Launchpad"),
        ("malone", Launchpad, "https://launchpad.net", "Launchpad"),
        ("debian", Debbugs, "https://bugs.debian.org", "Debian"),
        ("trac", Trac, "https://trac.edgewall.org/ticket", "Trac"),
        ("django", Trac, "https://code.djangoproject.com/ticket", "Django"),
        ("cups", Str, "http://www.cups.org/str.php", "CUPS"),
        ("gnewsense", Wikiforms, "http://bugs.gnewsense.org/Bugs", "gNewSense"),
        (
            "supybot",
            Sourceforge,
            "http://sourceforge.net/tracker/?group_id=58965&atid=489447",
            "Supybot",
        ),
        ("mantis", Mantis, "https://www.mantisbt.org/bugs", "Mantis"),
        ("sourceforge", Sourceforge, "http://sourceforge.net/tracker/", "Sourceforge"),
    ]
    .into_iter()
    .map(|(name, kind, url, description)| Tracker::new(name, kind, url, description))
    .collect()
}
