//! Debbugs adapter over the `Debbugs/SOAP/Status` service.

use crate::bug_report::BugReport;
use crate::http_transport::HttpTransport;
use crate::soap_rpc::{call_soap_method, SoapOutcome, SoapParam};
use crate::tracker::Tracker;
use crate::tracker_error::TrackerError;

pub const DEBBUGS_NAMESPACE: &str = "Debbugs/SOAP/Status";
const DEBBUGS_METHOD: &str = "get_status";

pub(crate) async fn fetch_debbugs(
    http: &HttpTransport,
    endpoint: &str,
    tracker: &Tracker,
    id: u64,
) -> Result<BugReport, TrackerError> {
    let bug = i64::try_from(id).map_err(|_| TrackerError::NotFound)?;
    let outcome = call_soap_method(
        http,
        &tracker.description,
        endpoint,
        DEBBUGS_NAMESPACE,
        DEBBUGS_METHOD,
        &[("bugs", SoapParam::Int(bug))],
    )
    .await?;
    debbugs_report_from_outcome(tracker, id, endpoint, outcome)
}

/// Reads the status record from a `get_status` reply: an `item` keyed by
/// the bug number whose `value` holds the record.
pub fn debbugs_report_from_outcome(
    tracker: &Tracker,
    id: u64,
    endpoint: &str,
    outcome: SoapOutcome,
) -> Result<BugReport, TrackerError> {
    let result = match outcome {
        SoapOutcome::Value(result) => result,
        SoapOutcome::Empty => return Err(TrackerError::NotFound),
        SoapOutcome::Fault(message) => {
            return Err(TrackerError::protocol(&tracker.description, message, endpoint))
        }
    };
    let Some(record) = result.find("value").filter(|value| value.has_content()) else {
        return Err(TrackerError::NotFound);
    };

    let missing = |field: &str| {
        TrackerError::protocol(&tracker.description, format!("missing {field}"), endpoint)
    };
    let product = record.child_text("package").ok_or_else(|| missing("package"))?;
    let title = record.child_text("subject").ok_or_else(|| missing("subject"))?;
    let severity = record.child_text("severity").ok_or_else(|| missing("severity"))?;
    let fixed = record
        .child("fixed_versions")
        .is_some_and(|versions| versions.has_content());
    let status = if fixed { "Fixed" } else { "Open" };

    Ok(
        BugReport::new(id, title, &severity, status, format!("{}/{id}", tracker.url))
            .with_product(Some(product)),
    )
}

#[cfg(test)]
mod tests {
    use super::debbugs_report_from_outcome;
    use crate::soap_rpc::{parse_soap_response, SoapOutcome};
    use crate::tracker::{Tracker, TrackerKind};
    use crate::tracker_error::TrackerError;

    fn debian() -> Tracker {
        Tracker::new("debian", TrackerKind::Debbugs, "https://bugs.debian.org", "Debian")
    }

    fn status_reply(fixed_versions: &str) -> String {
        format!(
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
<get_statusResponse xmlns="Debbugs/SOAP/Status"><s-gensym3>
<item><key>12345</key><value>
  <package>coreutils</package>
  <subject>ls: wrong colour for symlinks</subject>
  <severity>normal</severity>
  <fixed_versions>{fixed_versions}</fixed_versions>
</value></item>
</s-gensym3></get_statusResponse></soap:Body></soap:Envelope>"#
        )
    }

    #[test]
    fn functional_debbugs_status_follows_fixed_versions() {
        let open = parse_soap_response(&status_reply(""), "get_status").expect("open");
        let report = debbugs_report_from_outcome(&debian(), 12345, "e", open).expect("report");
        assert_eq!(report.status, "Open");
        assert_eq!(report.severity, "Normal");
        assert_eq!(report.product.as_deref(), Some("coreutils"));
        assert_eq!(report.url, "https://bugs.debian.org/12345");

        let fixed = parse_soap_response(&status_reply("<item>8.32-1</item>"), "get_status")
            .expect("fixed");
        let report = debbugs_report_from_outcome(&debian(), 12345, "e", fixed).expect("report");
        assert_eq!(report.status, "Fixed");
    }

    #[test]
    fn unit_debbugs_empty_result_is_not_found() {
        assert_eq!(
            debbugs_report_from_outcome(&debian(), 1, "e", SoapOutcome::Empty),
            Err(TrackerError::NotFound)
        );
    }
}
