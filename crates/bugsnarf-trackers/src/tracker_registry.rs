//! Named tracker table with unique-prefix abbreviations and URL-based
//! lookup.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::tracker::{normalize_tracker_name, BugFetcher, Tracker, TrackerKind};
use crate::tracker_error::TrackerError;

#[derive(Debug, Default)]
struct RegistryState {
    trackers: BTreeMap<String, Tracker>,
    abbreviations: HashMap<String, String>,
}

impl RegistryState {
    fn rebuild_abbreviations(&mut self) {
        self.abbreviations = build_abbreviation_table(self.trackers.keys().map(String::as_str));
    }
}

#[derive(Debug, Default)]
/// Thread-safe registry; every mutation rebuilds the abbreviation table
/// under the same lock, so readers never see a stale prefix.
pub struct TrackerRegistry {
    state: Mutex<RegistryState>,
}

/// Maps every prefix unique to one name (and every full name) to that name.
pub fn build_abbreviation_table<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> HashMap<String, String> {
    let names: Vec<&str> = names.into_iter().collect();
    let mut prefixes: HashMap<&str, Option<&str>> = HashMap::new();
    for name in &names {
        for (index, ch) in name.char_indices() {
            let prefix = &name[..index + ch.len_utf8()];
            prefixes
                .entry(prefix)
                .and_modify(|owner| {
                    if *owner != Some(*name) {
                        *owner = None;
                    }
                })
                .or_insert(Some(*name));
        }
    }
    for name in &names {
        prefixes.insert(*name, Some(*name));
    }
    prefixes
        .into_iter()
        .filter_map(|(prefix, owner)| owner.map(|owner| (prefix.to_string(), owner.to_string())))
        .collect()
}

impl TrackerRegistry {
    pub fn new(trackers: impl IntoIterator<Item = Tracker>) -> Self {
        let mut state = RegistryState {
            trackers: trackers
                .into_iter()
                .map(Tracker::normalized)
                .map(|tracker| (tracker.name.clone(), tracker))
                .collect(),
            abbreviations: HashMap::new(),
        };
        state.rebuild_abbreviations();
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exact name first, then unique prefix. Case-insensitive.
    pub fn resolve(&self, name_or_abbreviation: &str) -> Result<Tracker, TrackerError> {
        let key = normalize_tracker_name(name_or_abbreviation);
        let state = self.state();
        let name = if state.trackers.contains_key(&key) {
            Some(key.as_str())
        } else {
            state.abbreviations.get(&key).map(String::as_str)
        };
        name.and_then(|name| state.trackers.get(name))
            .cloned()
            .ok_or_else(|| TrackerError::UnknownTracker(name_or_abbreviation.trim().to_string()))
    }

    /// Exact (case-insensitive) name only; no abbreviations.
    pub fn get(&self, name: &str) -> Option<Tracker> {
        self.state().trackers.get(&normalize_tracker_name(name)).cloned()
    }

    /// Registers a tracker, replacing any existing entry of the same name.
    pub fn add(
        &self,
        name: &str,
        kind: &str,
        url: &str,
        description: Option<&str>,
    ) -> Result<Tracker, TrackerError> {
        let kind: TrackerKind = kind.parse()?;
        if normalize_tracker_name(name).is_empty() {
            return Err(TrackerError::UnknownTracker(name.to_string()));
        }
        let tracker = Tracker::new(name, kind, url, description.unwrap_or_default());
        Ok(self.insert(tracker))
    }

    pub fn insert(&self, tracker: Tracker) -> Tracker {
        let tracker = tracker.normalized();
        let mut state = self.state();
        state.trackers.insert(tracker.name.clone(), tracker.clone());
        state.rebuild_abbreviations();
        tracker
    }

    pub fn remove(&self, name_or_abbreviation: &str) -> Result<Tracker, TrackerError> {
        let tracker = self.resolve(name_or_abbreviation)?;
        let mut state = self.state();
        let removed = state
            .trackers
            .remove(&tracker.name)
            .ok_or_else(|| TrackerError::UnknownTracker(name_or_abbreviation.trim().to_string()))?;
        state.rebuild_abbreviations();
        Ok(removed)
    }

    /// Moves a tracker to a new name, keeping kind and url. The description
    /// is replaced only when one is given.
    pub fn rename(
        &self,
        old_name: &str,
        new_name: &str,
        new_description: Option<&str>,
    ) -> Result<Tracker, TrackerError> {
        if normalize_tracker_name(new_name).is_empty() {
            return Err(TrackerError::UnknownTracker(new_name.to_string()));
        }
        let mut state = self.state();
        let old_key = normalize_tracker_name(old_name);
        let old_key = if state.trackers.contains_key(&old_key) {
            old_key
        } else {
            state
                .abbreviations
                .get(&old_key)
                .cloned()
                .ok_or_else(|| TrackerError::UnknownTracker(old_name.trim().to_string()))?
        };
        let old = state
            .trackers
            .remove(&old_key)
            .ok_or_else(|| TrackerError::UnknownTracker(old_name.trim().to_string()))?;
        let description = new_description
            .map(str::trim)
            .filter(|description| !description.is_empty())
            .unwrap_or(&old.description);
        let renamed = Tracker::new(new_name, old.kind, &old.url, description);
        state.trackers.insert(renamed.name.clone(), renamed.clone());
        state.rebuild_abbreviations();
        Ok(renamed)
    }

    /// Registered trackers ordered by name.
    pub fn list(&self) -> Vec<Tracker> {
        self.state().trackers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state().trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the registered tracker serving `url`, without network access.
    ///
    /// `aux` is the Sourceforge `group_id=N&atid=M` token, when present.
    pub fn match_url(&self, url: &str, aux: Option<&str>) -> Option<Tracker> {
        let snarfed = normalize_snarf_url(url);
        let (host, path) = split_host_path(&snarfed);
        let state = self.state();
        let trackers = || state.trackers.values();

        if let Some(aux) = aux.filter(|aux| !aux.is_empty()) {
            if let Some(tracker) = trackers()
                .find(|tracker| tracker.kind == TrackerKind::Sourceforge && tracker.url.contains(aux))
            {
                return Some(tracker.clone());
            }
        }

        let mut best: Option<(&Tracker, usize)> = None;
        for tracker in trackers() {
            let normalized = normalize_snarf_url(&tracker.url);
            let (tracker_host, tracker_path) = split_host_path(&normalized);
            if tracker_host != host || !path_has_prefix(path, tracker_path) {
                continue;
            }
            if best.map_or(true, |(_, length)| tracker_path.len() > length) {
                best = Some((tracker, tracker_path.len()));
            }
        }
        if let Some((tracker, _)) = best {
            return Some(tracker.clone());
        }

        if let Some(tracker) = trackers().find(|tracker| {
            let normalized = normalize_snarf_url(&tracker.url);
            let (tracker_host, _) = split_host_path(&normalized);
            !tracker_host.is_empty() && host.contains(tracker_host)
        }) {
            return Some(tracker.clone());
        }

        if host == "sourceforge.net" || host.ends_with(".sourceforge.net") {
            return state.trackers.get("sourceforge").cloned();
        }
        None
    }

    /// [`match_url`](Self::match_url), falling back to Bugzilla discovery for
    /// `show_bug.cgi` links. A discovered tracker is registered before it is
    /// returned.
    pub async fn discover_by_url(
        &self,
        url: &str,
        aux: Option<&str>,
        fetcher: &dyn BugFetcher,
    ) -> Option<Tracker> {
        if let Some(tracker) = self.match_url(url, aux) {
            return Some(tracker);
        }
        if !url.contains("show_bug.cgi") {
            return None;
        }
        let discovered = fetcher.discover(url).await?;
        tracing::info!(tracker = %discovered.name, url = %discovered.url, "registering discovered tracker");
        Some(self.insert(discovered))
    }
}

/// Lower-cased host plus path, scheme removed and `sf.net` expanded.
pub fn normalize_snarf_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let (host, path) = split_host_path(without_scheme);
    let mut host = host.to_ascii_lowercase();
    if host == "sf.net" || host.ends_with(".sf.net") {
        host = format!("{}sourceforge.net", &host[..host.len() - "sf.net".len()]);
    }
    if path.is_empty() {
        host
    } else {
        format!("{host}/{path}")
    }
}

fn split_host_path(url: &str) -> (&str, &str) {
    match url.split_once('/') {
        Some((host, path)) => (host, path.trim_end_matches('/')),
        None => (url, ""),
    }
}

fn path_has_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_abbreviation_table, normalize_snarf_url, TrackerRegistry};
    use crate::tracker::{builtin_trackers, Tracker, TrackerKind};
    use crate::tracker_error::TrackerError;

    fn registry() -> TrackerRegistry {
        TrackerRegistry::new(builtin_trackers())
    }

    #[test]
    fn unit_abbreviation_table_keeps_only_unique_prefixes() {
        let table = build_abbreviation_table(["gnome", "gnome2", "kde"]);
        assert_eq!(table.get("k").map(String::as_str), Some("kde"));
        assert_eq!(table.get("gnome").map(String::as_str), Some("gnome"));
        assert_eq!(table.get("gnome2").map(String::as_str), Some("gnome2"));
        assert!(!table.contains_key("gn"));
        assert!(!table.contains_key("gnom"));
    }

    #[test]
    fn functional_resolve_prefers_exact_then_unique_prefix() {
        let registry = registry();
        assert_eq!(registry.resolve("moz").expect("moz").name, "mozilla");
        assert_eq!(registry.resolve("GNOME").expect("gnome").name, "gnome");
        assert_eq!(registry.resolve("lp").expect("lp").name, "lp");
        assert_eq!(
            registry.resolve("free"),
            Err(TrackerError::UnknownTracker("free".to_string()))
        );
        assert_eq!(
            registry.resolve("nosuch"),
            Err(TrackerError::UnknownTracker("nosuch".to_string()))
        );
    }

    #[test]
    fn functional_add_remove_rename_keep_abbreviations_current() {
        let registry = TrackerRegistry::new(Vec::<Tracker>::new());
        assert!(registry.is_empty());
        let added = registry
            .add("Example", "Trac", "https://trac.example.org/ticket/", Some("Example Trac"))
            .expect("add");
        assert_eq!(added.name, "example");
        assert_eq!(added.url, "https://trac.example.org/ticket");
        assert_eq!(registry.resolve("ex").expect("prefix").name, "example");

        registry
            .add("exotic", "bugzilla", "https://bz.exotic.org", None)
            .expect("add");
        assert!(registry.resolve("ex").is_err());
        assert_eq!(registry.resolve("exa").expect("exa").name, "example");

        let renamed = registry.rename("exa", "sample", None).expect("rename");
        assert_eq!(renamed.description, "Example Trac");
        assert_eq!(renamed.kind, TrackerKind::Trac);
        assert!(registry.resolve("example").is_err());
        assert_eq!(registry.resolve("ex").expect("exotic").name, "exotic");

        registry.remove("sam").expect("remove");
        assert_eq!(registry.list().len(), 1);
        assert_eq!(
            registry.add("x", "jira", "https://jira.example.org", None),
            Err(TrackerError::UnknownTrackerKind("jira".to_string()))
        );
    }

    #[test]
    fn regression_deserialized_trackers_are_normalized_on_registration() {
        let tracker: Tracker = serde_json::from_str(
            r#"{"name":" KDE ","url":"https://bugs.kde.org/","description":"","kind":"bugzilla"}"#,
        )
        .expect("tracker json");
        let registry = TrackerRegistry::new(vec![tracker.clone()]);

        let resolved = registry.resolve("KDE").expect("mixed-case lookup");
        assert_eq!(resolved.name, "kde");
        assert_eq!(resolved.url, "https://bugs.kde.org");
        assert_eq!(resolved.description, "kde");
        assert_eq!(registry.resolve("kd").expect("prefix").name, "kde");

        let other = TrackerRegistry::new(Vec::<Tracker>::new());
        assert_eq!(other.insert(tracker).name, "kde");
        assert!(other.resolve("kde").is_ok());
    }

    #[test]
    fn unit_get_matches_exact_names_only() {
        let registry = TrackerRegistry::new(builtin_trackers());
        assert_eq!(registry.get("KDE").expect("exact").name, "kde");
        assert!(registry.get("kd").is_none());
        assert!(registry.resolve("kd").is_ok());
    }

    #[test]
    fn unit_normalize_snarf_url_strips_scheme_and_expands_sf() {
        assert_eq!(
            normalize_snarf_url("HTTPS://SF.net/tracker/?aid=1"),
            "sourceforge.net/tracker/?aid=1"
        );
        assert_eq!(normalize_snarf_url("https://bugs.kde.org/"), "bugs.kde.org");
    }

    #[test]
    fn functional_match_url_prefers_longest_path_prefix() {
        let registry = TrackerRegistry::new(vec![
            Tracker::new("site", TrackerKind::Trac, "https://example.org", "Site"),
            Tracker::new("proj", TrackerKind::Trac, "https://example.org/proj/ticket", "Proj"),
        ]);
        assert_eq!(
            registry
                .match_url("https://example.org/proj/ticket/12", None)
                .map(|tracker| tracker.name),
            Some("proj".to_string())
        );
        assert_eq!(
            registry
                .match_url("https://example.org/other/ticket/12", None)
                .map(|tracker| tracker.name),
            Some("site".to_string())
        );
    }

    #[test]
    fn functional_match_url_handles_sourceforge_aux_and_host_containment() {
        let registry = registry();
        let supybot = registry.match_url(
            "http://sf.net/tracker/index.php?func=detail&aid=1&group_id=58965&atid=489447",
            Some("group_id=58965&atid=489447"),
        );
        assert_eq!(supybot.map(|tracker| tracker.name), Some("supybot".to_string()));

        let fallback = registry.match_url("http://sourceforge.net/support/tracker.php?aid=99", None);
        assert_eq!(fallback.map(|tracker| tracker.name), Some("sourceforge".to_string()));

        let launchpad = registry.match_url("https://bugs.launchpad.net/ubuntu/+bug/123", None);
        assert_eq!(launchpad.map(|tracker| tracker.kind), Some(TrackerKind::Launchpad));

        assert_eq!(registry.match_url("https://unknown.example.net/bugs/1", None), None);
    }
}
