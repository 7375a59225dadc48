/// Maps an arbitrary label onto a single safe directory-name segment.
///
/// Anything outside `[A-Za-z0-9._-]` becomes `_`, and the relative
/// segments `.`/`..` (or an empty label) collapse to `_` so the result can
/// never escape its parent directory.
pub fn sanitize_path_segment(raw: &str) -> String {
    let sanitized: String = raw
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|ch| ch == '.') {
        return "_".to_string();
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::sanitize_path_segment;

    #[test]
    fn unit_sanitize_path_segment_keeps_plain_names() {
        assert_eq!(sanitize_path_segment("launchpad"), "launchpad");
        assert_eq!(sanitize_path_segment("bugs.kde.org"), "bugs.kde.org");
    }

    #[test]
    fn regression_sanitize_path_segment_blocks_traversal() {
        assert_eq!(sanitize_path_segment(".."), "_");
        assert_eq!(sanitize_path_segment("."), "_");
        assert_eq!(sanitize_path_segment(""), "_");
        assert_eq!(sanitize_path_segment("../etc"), ".._etc");
        assert_eq!(sanitize_path_segment("a/b"), "a_b");
    }
}
