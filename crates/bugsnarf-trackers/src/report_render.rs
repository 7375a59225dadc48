//! One-line rendering of bug reports and tracker errors for chat output.

use crate::bug_report::BugReport;
use crate::tracker::Tracker;
use crate::tracker_error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Include the backend-specific extra text.
    pub show_extended: bool,
    pub show_assignee: bool,
    /// Off when the report answers a link that was already posted.
    pub show_url: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_extended: false,
            show_assignee: false,
            show_url: true,
        }
    }
}

/// `<desc> bug <id> in <product> "<title>" <extra> [<Severity>,<Status>] <url>`
pub fn render_report_line(description: &str, report: &BugReport, options: RenderOptions) -> String {
    let mut line = format!("{description} bug {}", report.id);
    if let Some(product) = &report.product {
        line.push_str(&format!(" in {product}"));
    }
    line.push_str(&format!(" \"{}\"", report.title));
    if options.show_extended {
        if let Some(extra) = report.extra.as_deref().filter(|extra| !extra.is_empty()) {
            line.push(' ');
            line.push_str(extra);
        }
    }
    line.push_str(&format!(" [{},{}]", report.severity, report.status));
    if options.show_url && !report.url.is_empty() {
        line.push(' ');
        line.push_str(&report.url);
    }
    if options.show_assignee {
        if let Some(assignee) = &report.assignee {
            line.push_str(&format!(" - Assigned to {assignee}"));
        }
    }
    line.trim().to_string()
}

/// User-facing text for a failed lookup. Protocol failures get a generic
/// line; their diagnostic belongs in the log.
pub fn render_lookup_error(tracker: &Tracker, id: u64, error: &TrackerError) -> String {
    match error {
        TrackerError::NotFound => format!("{} bug {id} could not be found", tracker.description),
        TrackerError::Private { public_url } => format!("Bug {id} on {public_url} is private"),
        other if other.is_user_facing() => other.to_string(),
        _ => format!("{} bug {id} could not be retrieved", tracker.description),
    }
}
