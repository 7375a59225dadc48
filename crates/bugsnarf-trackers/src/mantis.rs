//! Mantis adapter over the MantisConnect SOAP endpoint.

use crate::bug_report::BugReport;
use crate::http_transport::HttpTransport;
use crate::soap_rpc::{call_soap_method, SoapOutcome, SoapParam};
use crate::tracker::Tracker;
use crate::tracker_error::TrackerError;
use crate::xml_tree::XmlNode;

pub const MANTIS_NAMESPACE: &str = "http://futureware.biz/mantisconnect";
const MANTIS_METHOD: &str = "mc_issue_get";

pub fn mantis_endpoint(tracker: &Tracker) -> String {
    format!("{}/api/soap/mantisconnect.php", tracker.url)
}

pub(crate) async fn fetch_mantis(
    http: &HttpTransport,
    tracker: &Tracker,
    id: u64,
) -> Result<BugReport, TrackerError> {
    let endpoint = mantis_endpoint(tracker);
    let issue_id = i64::try_from(id).map_err(|_| TrackerError::NotFound)?;
    let outcome = call_soap_method(
        http,
        &tracker.description,
        &endpoint,
        MANTIS_NAMESPACE,
        MANTIS_METHOD,
        &[
            ("username", SoapParam::Str(String::new())),
            ("password", SoapParam::Str(String::new())),
            ("issue_id", SoapParam::Int(issue_id)),
        ],
    )
    .await?;
    mantis_report_from_outcome(tracker, id, &endpoint, outcome)
}

pub fn mantis_report_from_outcome(
    tracker: &Tracker,
    id: u64,
    endpoint: &str,
    outcome: SoapOutcome,
) -> Result<BugReport, TrackerError> {
    let issue = match outcome {
        SoapOutcome::Value(issue) => issue,
        SoapOutcome::Empty => return Err(TrackerError::NotFound),
        SoapOutcome::Fault(message) if message.to_ascii_lowercase().contains("not exist") => {
            return Err(TrackerError::NotFound)
        }
        SoapOutcome::Fault(message) => {
            return Err(TrackerError::protocol(&tracker.description, message, endpoint))
        }
    };

    let missing = |field: &str| {
        TrackerError::protocol(&tracker.description, format!("missing {field}"), endpoint)
    };
    let title = issue.child_text("summary").ok_or_else(|| missing("summary"))?;
    let product = named_child(&issue, "project").ok_or_else(|| missing("project"))?;
    let severity = named_child(&issue, "priority").ok_or_else(|| missing("priority"))?;
    let status = named_child(&issue, "resolution").ok_or_else(|| missing("resolution"))?;
    let assignee = issue
        .child("handler")
        .and_then(|handler| handler.child_text("name"));

    Ok(BugReport::new(
        id,
        title,
        &severity,
        &status,
        format!("{}/view.php?id={id}", tracker.url),
    )
    .with_product(Some(product))
    .with_assignee(assignee))
}

/// Mantis wraps enumerations as `{id, name}` structs.
fn named_child(issue: &XmlNode, field: &str) -> Option<String> {
    issue.child(field).and_then(|node| node.child_text("name"))
}
