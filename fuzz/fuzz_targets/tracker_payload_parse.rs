#![no_main]

use bugsnarf_trackers::bugzilla::parse_bugzilla_xml;
use bugsnarf_trackers::launchpad::parse_text_export;
use bugsnarf_trackers::trac::parse_trac_tab;
use bugsnarf_trackers::{Tracker, TrackerError, TrackerKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    let trac = Tracker::new("trac", TrackerKind::Trac, "https://trac.example.org/ticket", "Trac");
    if let Ok(report) = parse_trac_tab(&trac, 7, "fuzz", &raw) {
        assert_eq!(report.id, 7);
        assert!(!report.title.is_empty());
        assert_eq!(report.url, "https://trac.example.org/ticket/7");
    }

    let bugzilla = Tracker::new("bz", TrackerKind::Bugzilla, "https://bz.example.org", "Bz");
    match parse_bugzilla_xml(&bugzilla, 9, "fuzz", &raw) {
        Ok(report) => assert_eq!(report.id, 9),
        Err(TrackerError::NotFound | TrackerError::Private { .. } | TrackerError::Protocol { .. }) => {}
        Err(other) => panic!("unexpected bugzilla error: {other}"),
    }

    if let Ok(bug) = parse_text_export(11, &raw) {
        assert_eq!(bug.id, 11);
    }
});
