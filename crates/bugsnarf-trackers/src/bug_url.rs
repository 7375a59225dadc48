//! Recognizes tracker bug links in free text.

use std::sync::LazyLock;

use regex::Regex;

static BUG_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<tracker>https?://\S*?)/(?:Bugs/0*|str\.php\?L|show_bug\.cgi\?id=|bugreport\.cgi\?bug=|(?:bugs|\+bug)/|ticket/|tracker/|\S*aid=)(?P<bug>\d+)(?P<aux>&group_id=\d+&at_?id=\d+)?",
    )
    .expect("bug url regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugUrlMatch {
    /// The matched link, used for tracker lookup.
    pub url: String,
    pub id: u64,
    /// Sourceforge `group_id=N&atid=M` token, when the link carries one.
    pub aux: Option<String>,
}

/// Every bug link in `text`, in order of appearance, capped at `limit`.
pub fn parse_bug_urls(text: &str, limit: usize) -> Vec<BugUrlMatch> {
    BUG_URL_REGEX
        .captures_iter(text)
        .filter_map(|captures| {
            let id = captures.name("bug")?.as_str().parse().ok()?;
            Some(BugUrlMatch {
                url: captures.get(0)?.as_str().to_string(),
                id,
                aux: captures.name("aux").map(|aux| normalize_aux(aux.as_str())),
            })
        })
        .take(limit)
        .collect()
}

pub fn parse_bug_url(text: &str) -> Option<BugUrlMatch> {
    parse_bug_urls(text, 1).into_iter().next()
}

/// `&group_id=1&at_id=2` and `&group_id=1&atid=2` both become
/// `group_id=1&atid=2`, the form configured tracker urls use.
fn normalize_aux(raw: &str) -> String {
    raw.trim_start_matches('&').replacen("at_id=", "atid=", 1)
}
