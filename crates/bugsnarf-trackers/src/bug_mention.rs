//! Recognizes plain-text bug mentions such as `bug 12345`, `kde 4567`,
//! `ubuntu bugs 101 and 202`, or `(LP: #98765)`.

use std::sync::LazyLock;

use regex::Regex;

/// Ids at or below this are dropped from mentions that do not say "bug";
/// small numbers in chat are rarely bug references.
pub const MIN_IMPLICIT_BUG_ID: u64 = 100;

static BUG_MENTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?P<bt>(?:[a-z0-9]+)?\s+bugs?:?|[a-z0-9]+:?)\s+#?(?P<bug>\d+(?:[-.]\d+)*(?:(?:,|\s*(?:and|en|et|und|ir))\s*#?\d+(?:[-.]\d+)*)*)",
    )
    .expect("bug mention regex")
});

static MENTION_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[-.]\d+)*").expect("mention id regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
/// Which tracker a mention asks for.
pub enum MentionTarget {
    /// `kde 4567`, `LP: #1`: only this exact tracker; otherwise ignore.
    Required(String),
    /// `ubuntu bug 5`: this exact tracker when registered, else the
    /// channel's snarf target.
    Preferred(String),
    /// `bug 5`: the channel's snarf target.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugMention {
    pub target: MentionTarget,
    pub ids: Vec<u64>,
    /// The mention named "bug" or "bugs" outright.
    pub explicit: bool,
}

/// Every bug mention in `text`, in order, with at most `limit` ids overall.
/// Mentions left without ids are omitted.
pub fn parse_bug_mentions(text: &str, limit: usize) -> Vec<BugMention> {
    let mut remaining = limit;
    let mut mentions = Vec::new();
    for captures in BUG_MENTION_REGEX.captures_iter(text) {
        if remaining == 0 {
            break;
        }
        let (Some(bt), Some(bug)) = (captures.name("bt"), captures.name("bug")) else {
            continue;
        };
        let words: Vec<String> = bt
            .as_str()
            .split_whitespace()
            .map(|word| word.trim_end_matches(':').to_ascii_lowercase())
            .collect();
        let explicit = words
            .last()
            .is_some_and(|word| word == "bug" || word == "bugs");
        let target = match words.as_slice() {
            [only] if only == "bug" || only == "bugs" => MentionTarget::Default,
            [only] => MentionTarget::Required(only.clone()),
            [first, _] => MentionTarget::Preferred(first.clone()),
            _ => continue,
        };

        let mut ids = mention_ids(bug.as_str());
        ids.truncate(remaining);
        if !explicit {
            ids.retain(|id| *id > MIN_IMPLICIT_BUG_ID);
        }
        if ids.is_empty() {
            continue;
        }
        remaining -= ids.len();
        mentions.push(BugMention {
            target,
            ids,
            explicit,
        });
    }
    mentions
}

/// Leading run of plain ids; a version-like token (`8.04`, `2-1`) ends the
/// list, and one in first position voids the mention.
fn mention_ids(raw: &str) -> Vec<u64> {
    MENTION_ID_REGEX
        .find_iter(raw)
        .map(|token| token.as_str())
        .take_while(|token| !token.contains(['-', '.']))
        .map_while(|token| token.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_bug_mentions, BugMention, MentionTarget};

    fn mention(target: MentionTarget, ids: &[u64], explicit: bool) -> BugMention {
        BugMention {
            target,
            ids: ids.to_vec(),
            explicit,
        }
    }

    #[test]
    fn functional_mentions_resolve_their_target_shape() {
        assert_eq!(
            parse_bug_mentions("I filed bug 12", 5),
            vec![mention(MentionTarget::Preferred("filed".to_string()), &[12], true)]
        );
        assert_eq!(
            parse_bug_mentions("bug #12 again", 5),
            vec![mention(MentionTarget::Default, &[12], true)]
        );
        assert_eq!(
            parse_bug_mentions("kde 4567 crashes", 5),
            vec![mention(MentionTarget::Required("kde".to_string()), &[4567], false)]
        );
        assert_eq!(
            parse_bug_mentions("Fix crash on start (LP: #98765)", 5),
            vec![mention(MentionTarget::Required("lp".to_string()), &[98765], false)]
        );
        assert_eq!(
            parse_bug_mentions("Ubuntu Bugs: 300", 5),
            vec![mention(MentionTarget::Preferred("ubuntu".to_string()), &[300], true)]
        );
    }

    #[test]
    fn functional_id_lists_accept_localized_separators() {
        let found = parse_bug_mentions("debian bugs 101, 202 and #303 en 404 und 505", 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ids, vec![101, 202, 303, 404, 505]);
        assert_eq!(
            parse_bug_mentions("gnome 201 et 302 ir 403", 10)[0].ids,
            vec![201, 302, 403]
        );
    }

    #[test]
    fn unit_small_ids_need_the_word_bug() {
        assert!(parse_bug_mentions("we have 12 users and 99 problems", 5).is_empty());
        assert_eq!(
            parse_bug_mentions("kde 50, 150", 5)[0].ids,
            vec![150]
        );
        assert_eq!(parse_bug_mentions("that bug 50", 5)[0].ids, vec![50]);
    }

    #[test]
    fn unit_limit_spans_all_mentions() {
        let found = parse_bug_mentions("bugs 1, 2, 3 and kde 401, 402, 403", 5);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].ids, vec![1, 2, 3]);
        assert_eq!(found[1].ids, vec![401, 402]);
        assert!(parse_bug_mentions("bug 1", 0).is_empty());
    }

    #[test]
    fn regression_version_numbers_are_not_bug_ids() {
        assert!(parse_bug_mentions("upgrade to ubuntu 8.04 soon", 5).is_empty());
        assert!(parse_bug_mentions("gtk 2-12345 build", 5).is_empty());
        assert_eq!(parse_bug_mentions("bug 4711, 2.6.1", 5)[0].ids, vec![4711]);
    }
}
