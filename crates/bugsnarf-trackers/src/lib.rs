//! Bug tracker adapters, the tracker registry, and report rendering.

pub mod advisory_links;
pub mod bug_mention;
pub mod bug_report;
pub mod bug_url;
pub mod bugzilla;
pub mod debbugs;
pub mod entity_decode;
pub mod html_scrapers;
pub mod http_transport;
pub mod launchpad;
pub mod launchpad_tasks;
pub mod mantis;
pub mod report_render;
pub mod soap_rpc;
pub mod trac;
pub mod tracker;
pub mod tracker_error;
pub mod tracker_registry;
pub mod xml_tree;

pub use advisory_links::{oops_url, parse_cve_ids, parse_oops_ids, CveSummary};
pub use bug_mention::{parse_bug_mentions, BugMention, MentionTarget};
pub use bug_report::BugReport;
pub use bug_url::{parse_bug_url, parse_bug_urls, BugUrlMatch};
pub use http_transport::{HttpTransport, HttpTransportConfig};
pub use launchpad::{LaunchpadMode, LaunchpadOptions};
pub use report_render::{render_lookup_error, render_report_line, RenderOptions};
pub use tracker::{
    builtin_trackers, BugFetcher, Tracker, TrackerClient, TrackerClientConfig, TrackerKind,
};
pub use tracker_error::TrackerError;
pub use tracker_registry::TrackerRegistry;
