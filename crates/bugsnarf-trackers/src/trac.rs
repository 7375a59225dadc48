//! Trac adapter over the ticket `?format=tab` export.

use crate::bug_report::BugReport;
use crate::http_transport::HttpTransport;
use crate::tracker::{fetch_tracker_page, Tracker};
use crate::tracker_error::TrackerError;

const UNKNOWN: &str = "Unknown";

pub(crate) async fn fetch_trac(
    http: &HttpTransport,
    tracker: &Tracker,
    id: u64,
) -> Result<BugReport, TrackerError> {
    let url = format!("{}/{id}?format=tab", tracker.url);
    // Trac answers unknown tickets with an internal server error.
    let body = fetch_tracker_page(http, tracker, &url, &[404, 500]).await?;
    parse_trac_tab(tracker, id, &url, &body)
}

/// Parses a two-row tab-separated export: a header row naming the
/// columns and one data row.
pub fn parse_trac_tab(
    tracker: &Tracker,
    id: u64,
    request_url: &str,
    raw: &str,
) -> Result<BugReport, TrackerError> {
    let normalized = raw.replace("\r\n", "\n");
    let normalized = normalized.trim_start_matches('\u{feff}');
    let Some((header_line, rest)) = normalized.split_once('\n') else {
        return Err(TrackerError::protocol(
            &tracker.description,
            "missing ticket data row",
            request_url,
        ));
    };
    let data_line = rest.split('\n').next().unwrap_or_default();
    let headers: Vec<&str> = header_line.split('\t').map(str::trim).collect();
    let values: Vec<&str> = data_line.split('\t').collect();

    let column = |name: &str| {
        let index = headers.iter().position(|header| *header == name)?;
        values
            .get(index)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let title = column("summary").unwrap_or(UNKNOWN);
    let status = column("status").unwrap_or(UNKNOWN);
    let product = column("component").unwrap_or(UNKNOWN);
    let severity = column("severity")
        .or_else(|| column("priority"))
        .unwrap_or(UNKNOWN);
    let owner = column("owner").unwrap_or(UNKNOWN);

    Ok(
        BugReport::new(id, title, severity, status, format!("{}/{id}", tracker.url))
            .with_product(Some(product.to_string()))
            .with_assignee(Some(owner.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::parse_trac_tab;
    use crate::tracker::{Tracker, TrackerKind};
    use crate::tracker_error::TrackerError;

    fn trac() -> Tracker {
        Tracker::new("trac", TrackerKind::Trac, "https://trac.example.org/ticket", "Trac")
    }

    #[test]
    fn functional_trac_tab_maps_columns() {
        let raw = "summary\tstatus\tcomponent\tseverity\r\nCrash on load\tclosed\tcore\tmajor\r\n";
        let report = parse_trac_tab(&trac(), 42, "u", raw).expect("report");
        assert_eq!(report.title, "Crash on load");
        assert_eq!(report.status, "Closed");
        assert_eq!(report.product.as_deref(), Some("core"));
        assert_eq!(report.severity, "Major");
        assert_eq!(report.url, "https://trac.example.org/ticket/42");
    }

    #[test]
    fn unit_trac_severity_falls_back_to_priority_then_unknown() {
        let with_priority = "id\tsummary\tpriority\towner\n7\tSlow\thigh\talice\n";
        let report = parse_trac_tab(&trac(), 7, "u", with_priority).expect("report");
        assert_eq!(report.severity, "High");
        assert_eq!(report.assignee.as_deref(), Some("alice"));
        assert_eq!(report.status, "Unknown");
        assert_eq!(report.product.as_deref(), Some("Unknown"));

        let bare = "id\tsummary\n8\tNothing else\n";
        let report = parse_trac_tab(&trac(), 8, "u", bare).expect("report");
        assert_eq!(report.severity, "Unknown");
        assert_eq!(report.assignee.as_deref(), Some("Unknown"));
    }

    #[test]
    fn regression_trac_empty_leading_column_keeps_alignment() {
        let raw = "keywords\tsummary\tstatus\n\tAligned\tnew\n";
        let report = parse_trac_tab(&trac(), 9, "u", raw).expect("report");
        assert_eq!(report.title, "Aligned");
        assert_eq!(report.status, "New");
    }

    #[test]
    fn unit_trac_single_line_payload_is_protocol_error() {
        assert!(matches!(
            parse_trac_tab(&trac(), 1, "u", "summary\tstatus"),
            Err(TrackerError::Protocol { .. })
        ));
    }
}
