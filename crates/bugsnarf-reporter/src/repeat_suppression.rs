//! Per-channel suppression of repeated bug announcements.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bugsnarf_trackers::BugReport;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShownKey {
    channel: String,
    tracker: String,
    bug_id: u64,
}

#[derive(Debug)]
/// Remembers when each `(channel, tracker, bug)` was last shown.
///
/// Expired entries are evicted lazily on every check, using the window of
/// the channel being checked.
pub struct RepeatSuppressionCache {
    default_window: Duration,
    channel_windows: HashMap<String, Duration>,
    shown: Mutex<HashMap<ShownKey, Instant>>,
}

impl RepeatSuppressionCache {
    pub fn new(default_window: Duration) -> Self {
        Self {
            default_window,
            channel_windows: HashMap::new(),
            shown: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_channel_window(mut self, channel: &str, window: Duration) -> Self {
        self.channel_windows.insert(channel.to_string(), window);
        self
    }

    pub fn window_for(&self, channel: &str) -> Duration {
        self.channel_windows
            .get(channel)
            .copied()
            .unwrap_or(self.default_window)
    }

    fn shown(&self) -> MutexGuard<'_, HashMap<ShownKey, Instant>> {
        self.shown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn should_report(&self, channel: &str, tracker: &str, bug_id: u64) -> bool {
        self.should_report_at(channel, tracker, bug_id, Instant::now())
    }

    /// True when the triple was not shown within the channel's window; the
    /// triple is then recorded as shown at `now`.
    pub fn should_report_at(&self, channel: &str, tracker: &str, bug_id: u64, now: Instant) -> bool {
        let window = self.window_for(channel);
        let mut shown = self.shown();
        shown.retain(|_, shown_at| now.saturating_duration_since(*shown_at) <= window);
        let key = ShownKey {
            channel: channel.to_string(),
            tracker: tracker.to_string(),
            bug_id,
        };
        if shown.contains_key(&key) {
            return false;
        }
        shown.insert(key, now);
        true
    }

    /// Keeps the reports of a fetched sequence that pass
    /// [`should_report`](Self::should_report), in order.
    pub fn filter_reports(
        &self,
        channel: &str,
        tracker: &str,
        reports: Vec<BugReport>,
    ) -> Vec<BugReport> {
        reports
            .into_iter()
            .filter(|report| self.should_report(channel, tracker, report.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shown().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use bugsnarf_trackers::BugReport;

    use super::RepeatSuppressionCache;

    #[test]
    fn unit_should_report_suppresses_within_window_and_releases_after() {
        let cache = RepeatSuppressionCache::new(Duration::from_secs(300));
        let start = Instant::now();
        assert!(cache.should_report_at("#dev", "kde", 5, start));
        assert!(!cache.should_report_at("#dev", "kde", 5, start + Duration::from_secs(299)));
        assert!(cache.should_report_at("#dev", "kde", 5, start + Duration::from_secs(301)));
    }

    #[test]
    fn unit_triples_are_independent() {
        let cache = RepeatSuppressionCache::new(Duration::from_secs(300));
        let now = Instant::now();
        assert!(cache.should_report_at("#dev", "kde", 5, now));
        assert!(cache.should_report_at("#ops", "kde", 5, now));
        assert!(cache.should_report_at("#dev", "gnome", 5, now));
        assert!(cache.should_report_at("#dev", "kde", 6, now));
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn functional_channel_window_overrides_default() {
        let cache = RepeatSuppressionCache::new(Duration::from_secs(300))
            .with_channel_window("#fast", Duration::from_secs(10));
        let start = Instant::now();
        assert!(cache.should_report_at("#fast", "lp", 1, start));
        assert!(cache.should_report_at("#fast", "lp", 1, start + Duration::from_secs(11)));
        assert!(cache.should_report_at("#slow", "lp", 1, start));
        assert!(!cache.should_report_at("#slow", "lp", 1, start + Duration::from_secs(11)));
    }

    #[test]
    fn functional_filter_reports_applies_to_every_report_in_sequence() {
        let cache = RepeatSuppressionCache::new(Duration::from_secs(300));
        let report = |id| BugReport::new(id, "t", "low", "new", "u");
        assert!(cache.should_report("#dev", "lp", 20));
        let kept = cache.filter_reports("#dev", "lp", vec![report(10), report(20), report(30)]);
        assert_eq!(kept.iter().map(|r| r.id).collect::<Vec<_>>(), vec![10, 30]);
    }
}
