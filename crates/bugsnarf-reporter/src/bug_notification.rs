//! Launchpad bug-notification mail parsing.

use mailparse::{parse_headers, MailHeaderMap};
use thiserror::Error;

const BUG_HEADER: &str = "X-Launchpad-Bug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugNotification {
    /// Project the bug was filed against, e.g. `ubuntu`.
    pub tag: String,
    pub bug_id: u64,
    pub component: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Why a mail was ignored. None of these are failures.
pub enum NotificationSkip {
    #[error("mail headers could not be parsed")]
    Unparseable,
    #[error("no X-Launchpad-Bug header")]
    NotFromLaunchpad,
    #[error("no product or distribution in X-Launchpad-Bug")]
    NoProject,
    #[error("empty project tag")]
    EmptyTag,
    #[error("no bug id in Reply-To")]
    MissingBugId,
    #[error("not a new bug")]
    NotNew,
}

pub fn parse_bug_notification(raw: &[u8]) -> Result<BugNotification, NotificationSkip> {
    let (headers, _) = parse_headers(raw).map_err(|_| NotificationSkip::Unparseable)?;
    let bug_header = headers
        .get_first_value(BUG_HEADER)
        .ok_or(NotificationSkip::NotFromLaunchpad)?;
    if !bug_header.contains("product=") && !bug_header.contains("distribution=") {
        return Err(NotificationSkip::NoProject);
    }
    let tag = project_tag(&bug_header).ok_or(NotificationSkip::EmptyTag)?;

    let bug_id = headers
        .get_first_value("Reply-To")
        .and_then(|reply_to| reply_to.split_whitespace().nth(1)?.parse::<u64>().ok())
        .ok_or(NotificationSkip::MissingBugId)?;
    let subject = headers.get_first_value("Subject").unwrap_or_default();
    if !subject.contains("[NEW]") {
        return Err(NotificationSkip::NotNew);
    }

    Ok(BugNotification {
        tag,
        bug_id,
        component: component(&bug_header),
    })
}

/// First `;`-separated field with its `product=`/`distribution=` prefix
/// removed. A `name+suffix@domain` style value keeps only `suffix`.
fn project_tag(bug_header: &str) -> Option<String> {
    let first = bug_header.split(';').next().unwrap_or_default().trim();
    let value = first
        .strip_prefix("product=")
        .or_else(|| first.strip_prefix("distribution="))
        .unwrap_or(first)
        .trim();
    let value = match (value.find('+'), value.find('@')) {
        (Some(plus), Some(at)) if plus < at => &value[plus + 1..at],
        _ => value,
    };
    Some(value.trim().to_string()).filter(|tag| !tag.is_empty())
}

fn component(bug_header: &str) -> Option<String> {
    let start = bug_header.find("component=")? + "component=".len();
    let rest = &bug_header[start..];
    let value = rest.split(';').next().unwrap_or_default();
    Some(value.replace("None", "").trim().to_string()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{parse_bug_notification, BugNotification, NotificationSkip};

    fn mail(bug_header: Option<&str>, reply_to: &str, subject: &str) -> Vec<u8> {
        let mut raw = String::new();
        if let Some(bug_header) = bug_header {
            raw.push_str(&format!("X-Launchpad-Bug: {bug_header}\r\n"));
        }
        raw.push_str(&format!("Reply-To: {reply_to}\r\n"));
        raw.push_str(&format!("Subject: {subject}\r\n\r\nbody\r\n"));
        raw.into_bytes()
    }

    #[test]
    fn functional_new_bug_mail_yields_tag_id_and_component() {
        let raw = mail(
            Some("distribution=ubuntu; sourcepackage=gdm3; component=main; status=New; importance=Undecided"),
            "Bug 2034567 <2034567@bugs.launchpad.net>",
            "[Bug 2034567] [NEW] Login screen freezes",
        );
        assert_eq!(
            parse_bug_notification(&raw),
            Ok(BugNotification {
                tag: "ubuntu".to_string(),
                bug_id: 2034567,
                component: Some("main".to_string()),
            })
        );
    }

    #[test]
    fn unit_product_header_without_component() {
        let raw = mail(
            Some("product=bzr; status=New; importance=Undecided; assignee=None;"),
            "Bug 77 <77@bugs.launchpad.net>",
            "[Bug 77] [NEW] crash",
        );
        let notification = parse_bug_notification(&raw).expect("notification");
        assert_eq!(notification.tag, "bzr");
        assert_eq!(notification.component, None);
    }

    #[test]
    fn unit_component_none_is_dropped() {
        let raw = mail(
            Some("distribution=ubuntu; sourcepackage=None; component=None; status=New"),
            "Bug 5 <5@bugs.launchpad.net>",
            "[NEW] x",
        );
        assert_eq!(parse_bug_notification(&raw).expect("ok").component, None);
    }

    #[test]
    fn functional_irrelevant_mail_is_skipped_with_reason() {
        assert_eq!(
            parse_bug_notification(&mail(None, "Bug 1 <1@x>", "[NEW] x")),
            Err(NotificationSkip::NotFromLaunchpad)
        );
        assert_eq!(
            parse_bug_notification(&mail(Some("status=New"), "Bug 1 <1@x>", "[NEW] x")),
            Err(NotificationSkip::NoProject)
        );
        assert_eq!(
            parse_bug_notification(&mail(
                Some("product=bzr"),
                "Bug 1 <1@x>",
                "[Bug 1] Re: crash"
            )),
            Err(NotificationSkip::NotNew)
        );
        assert_eq!(
            parse_bug_notification(&mail(Some("product=bzr"), "nobody@example.org", "[NEW] x")),
            Err(NotificationSkip::MissingBugId)
        );
    }

    #[test]
    fn regression_plus_at_tag_keeps_inner_segment() {
        let raw = mail(
            Some("product=bugs+ubuntu-qa@lists.example.org; status=New"),
            "Bug 9 <9@bugs.launchpad.net>",
            "[NEW] x",
        );
        assert_eq!(parse_bug_notification(&raw).expect("ok").tag, "ubuntu-qa");
    }
}
