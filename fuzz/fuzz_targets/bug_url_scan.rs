#![no_main]

use bugsnarf_trackers::{parse_bug_mentions, parse_bug_urls, parse_cve_ids, parse_oops_ids};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let links = parse_bug_urls(&raw, 5);
    assert!(links.len() <= 5);
    for link in links {
        assert!(raw.contains(&link.url));
        assert!(link.url.starts_with("http"));
        if let Some(aux) = link.aux {
            assert!(aux.starts_with("group_id="));
            assert!(aux.contains("&atid="));
        }
    }

    let mentions = parse_bug_mentions(&raw, 5);
    assert!(mentions.iter().map(|mention| mention.ids.len()).sum::<usize>() <= 5);
    for mention in mentions {
        assert!(!mention.ids.is_empty());
        if !mention.explicit {
            assert!(mention.ids.iter().all(|id| *id > 100));
        }
    }
    for id in parse_oops_ids(&raw) {
        assert!(!id.eq_ignore_ascii_case("tools"));
    }
    for cve in parse_cve_ids(&raw) {
        assert!(cve.starts_with("CVE-"));
    }
});
