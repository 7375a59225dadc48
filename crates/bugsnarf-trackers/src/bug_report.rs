use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One normalized bug, independent of the backend that produced it.
///
/// `severity` and `status` are always display-cased (see
/// [`normalize_display_case`]); adapters build reports through
/// [`BugReport::new`] so callers never observe the backend's raw casing.
pub struct BugReport {
    pub id: u64,
    pub product: Option<String>,
    pub title: String,
    pub severity: String,
    pub status: String,
    pub assignee: Option<String>,
    pub url: String,
    pub extra: Option<String>,
}

impl BugReport {
    pub fn new(
        id: u64,
        title: impl Into<String>,
        severity: &str,
        status: &str,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            product: None,
            title: title.into(),
            severity: normalize_display_case(severity),
            status: normalize_display_case(status),
            assignee: None,
            url: url.into(),
            extra: None,
        }
    }

    pub fn with_product(mut self, product: Option<String>) -> Self {
        self.product = product.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn with_assignee(mut self, assignee: Option<String>) -> Self {
        self.assignee = assignee.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn with_extra(mut self, extra: Option<String>) -> Self {
        self.extra = extra;
        self
    }
}

/// Upper-cases the first character and lower-cases the rest.
pub fn normalize_display_case(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_display_case, BugReport};

    #[test]
    fn unit_severity_casing_is_idempotent() {
        assert_eq!(normalize_display_case("CRITICAL"), "Critical");
        assert_eq!(normalize_display_case("critical"), "Critical");
        assert_eq!(
            normalize_display_case(&normalize_display_case("cRiTiCaL")),
            "Critical"
        );
    }

    #[test]
    fn unit_normalize_display_case_handles_composite_and_empty_values() {
        assert_eq!(normalize_display_case("RESOLVED: FIXED"), "Resolved: fixed");
        assert_eq!(normalize_display_case("In Progress"), "In progress");
        assert_eq!(normalize_display_case(""), "");
        assert_eq!(normalize_display_case("  new "), "New");
    }

    #[test]
    fn functional_bug_report_builder_normalizes_and_drops_blank_optionals() {
        let report = BugReport::new(7, "Crash", "MAJOR", "closed", "https://example.org/7")
            .with_product(Some("  ".to_string()))
            .with_assignee(Some("alice".to_string()));
        assert_eq!(report.severity, "Major");
        assert_eq!(report.status, "Closed");
        assert_eq!(report.product, None);
        assert_eq!(report.assignee.as_deref(), Some("alice"));
    }
}
