#![no_main]

use bugsnarf_reporter::parse_bug_notification;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(notification) = parse_bug_notification(data) {
        assert!(!notification.tag.trim().is_empty());
        if let Some(component) = notification.component {
            assert!(!component.trim().is_empty());
        }
    }
});
