//! Primary-task selection for Launchpad bugs that affect several targets.

/// Status order from least to most actionable.
pub const STATUS_RANK: [&str; 10] = [
    "Unknown",
    "Invalid",
    "Won't Fix",
    "Fix Released",
    "Fix Committed",
    "New",
    "Incomplete",
    "Confirmed",
    "Triaged",
    "In Progress",
];

pub const IMPORTANCE_RANK: [&str; 7] = [
    "Unknown",
    "Undecided",
    "Wishlist",
    "Low",
    "Medium",
    "High",
    "Critical",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchpadTask {
    pub target: String,
    pub status: String,
    pub importance: String,
    pub assignee: Option<String>,
}

/// 0 for values outside the table, otherwise position + 1.
pub fn status_rank(status: &str) -> usize {
    rank_in(&STATUS_RANK, status)
}

pub fn importance_rank(importance: &str) -> usize {
    rank_in(&IMPORTANCE_RANK, importance)
}

fn rank_in(table: &[&str], value: &str) -> usize {
    let value = value.trim();
    table
        .iter()
        .position(|known| known.eq_ignore_ascii_case(value))
        .map_or(0, |index| index + 1)
}

/// Index of the task with the highest (status, importance) rank; the last
/// of several equally ranked tasks wins.
pub fn select_primary_index(tasks: &[LaunchpadTask]) -> Option<usize> {
    tasks
        .iter()
        .enumerate()
        .max_by_key(|(_, task)| (status_rank(&task.status), importance_rank(&task.importance)))
        .map(|(index, _)| index)
}

/// Drops the parenthesized qualifier Launchpad appends to task targets,
/// e.g. `linux (Ubuntu)` becomes `linux`.
pub fn strip_target_qualifier(target: &str) -> &str {
    match target.rfind(" (") {
        Some(index) if target.trim_end().ends_with(')') => target[..index].trim_end(),
        _ => target.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        importance_rank, select_primary_index, status_rank, strip_target_qualifier, LaunchpadTask,
    };

    fn task(target: &str, status: &str, importance: &str) -> LaunchpadTask {
        LaunchpadTask {
            target: target.to_string(),
            status: status.to_string(),
            importance: importance.to_string(),
            assignee: None,
        }
    }

    fn primary_target(tasks: &[LaunchpadTask]) -> Option<&str> {
        select_primary_index(tasks).map(|index| tasks[index].target.as_str())
    }

    #[test]
    fn unit_ranks_are_position_plus_one_with_unknown_values_at_zero() {
        assert_eq!(status_rank("Unknown"), 1);
        assert_eq!(status_rank("In Progress"), 10);
        assert_eq!(status_rank("won't fix"), 3);
        assert_eq!(status_rank("Deferred"), 0);
        assert_eq!(importance_rank("Critical"), 7);
        assert_eq!(importance_rank(""), 0);
    }

    #[test]
    fn functional_status_outranks_importance() {
        let tasks = vec![
            task("a", "New", "Low"),
            task("b", "In Progress", "Critical"),
        ];
        assert_eq!(primary_target(&tasks), Some("b"));

        let tasks = vec![
            task("a", "In Progress", "Low"),
            task("b", "New", "Critical"),
        ];
        assert_eq!(primary_target(&tasks), Some("a"));
    }

    #[test]
    fn regression_equal_rank_prefers_last_task() {
        let tasks = vec![task("first", "Confirmed", "High"), task("second", "Confirmed", "High")];
        assert_eq!(primary_target(&tasks), Some("second"));
        assert_eq!(select_primary_index(&[]), None);
    }

    #[test]
    fn unit_strip_target_qualifier_removes_trailing_parenthetical() {
        assert_eq!(strip_target_qualifier("linux (Ubuntu)"), "linux");
        assert_eq!(strip_target_qualifier("nova (Ubuntu Focal)"), "nova");
        assert_eq!(strip_target_qualifier("bzr"), "bzr");
    }
}
