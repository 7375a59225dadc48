use std::{collections::BTreeMap, collections::VecDeque, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use bugsnarf_reporter::{Mailbox, NewBugPoller, NewBugStore, PollerConfig, RepeatSuppressionCache};
use bugsnarf_trackers::{
    parse_bug_urls, render_report_line, BugFetcher, HttpTransportConfig, LaunchpadMode,
    LaunchpadOptions, RenderOptions, Tracker, TrackerClient, TrackerClientConfig, TrackerKind,
    TrackerRegistry,
};
use httpmock::prelude::*;
use tempfile::tempdir;
use tokio::sync::Mutex as AsyncMutex;

struct ScriptedMailbox {
    batches: AsyncMutex<VecDeque<Vec<Vec<u8>>>>,
}

impl ScriptedMailbox {
    fn new(batches: Vec<Vec<Vec<u8>>>) -> Self {
        Self {
            batches: AsyncMutex::new(batches.into()),
        }
    }
}

#[async_trait]
impl Mailbox for ScriptedMailbox {
    async fn fetch_unseen(&self, limit: usize) -> Result<Vec<Vec<u8>>> {
        let mut batch = self.batches.lock().await.pop_front().unwrap_or_default();
        batch.truncate(limit);
        Ok(batch)
    }
}

fn text_mode_client() -> TrackerClient {
    TrackerClient::new(TrackerClientConfig {
        http: HttpTransportConfig {
            request_timeout_ms: 2_000,
            max_retries: 0,
            retry_base_delay_ms: 1,
            ..HttpTransportConfig::default()
        },
        launchpad: LaunchpadOptions {
            mode: LaunchpadMode::Text,
            ..LaunchpadOptions::default()
        },
        ..TrackerClientConfig::default()
    })
    .expect("client")
}

fn notification(tag: &str, id: u64, component: &str) -> Vec<u8> {
    format!(
        "X-Launchpad-Bug: distribution={tag}; sourcepackage=gdm3; component={component}; status=New\r\n\
Reply-To: Bug {id} <{id}@bugs.launchpad.net>\r\n\
Subject: [Bug {id}] [NEW] Login loops\r\n\r\nA new bug was filed.\r\n"
    )
    .into_bytes()
}

fn text_export(id: u64, title: &str) -> String {
    format!(
        "bug: {id}\ntitle: {title}\nduplicate-of: \n\ntask: gdm3 (Ubuntu)\nstatus: New\nimportance: High\n"
    )
}

#[tokio::test]
async fn integration_mail_notifications_become_channel_announcements_once() {
    let server = MockServer::start();
    let login = server.mock(|when, then| {
        when.method(GET).path("/bugs/40/+text");
        then.status(200).body(text_export(40, "Login loops"));
    });
    let crash = server.mock(|when, then| {
        when.method(GET).path("/bugs/41/+text");
        then.status(200)
            .body(text_export(41, "[apport] gdm3 crashed with SIGSEGV"));
    });
    let registry = Arc::new(TrackerRegistry::new(vec![Tracker::new(
        "launchpad",
        TrackerKind::Launchpad,
        &server.base_url(),
        "Launchpad",
    )]));
    let mailbox = Arc::new(ScriptedMailbox::new(vec![
        vec![
            notification("ubuntu", 41, "main"),
            notification("ubuntu", 40, "main"),
            b"Subject: unrelated\r\n\r\nhello\r\n".to_vec(),
        ],
        vec![notification("ubuntu", 40, "main")],
    ]));
    let temp = tempdir().expect("tempdir");
    let poller = NewBugPoller::new(
        PollerConfig {
            poll_interval: Duration::from_millis(10),
            subscriptions: BTreeMap::from([
                ("#ubuntu-bugs".to_string(), vec!["ubuntu".to_string()]),
                ("#kde".to_string(), vec!["kubuntu".to_string()]),
            ]),
            ..PollerConfig::default()
        },
        registry,
        Arc::new(text_mode_client()),
        mailbox,
        NewBugStore::new(temp.path().join("reporter")),
    );

    let (report, announcements) = poller.poll_once().await.expect("first cycle");
    assert_eq!(report.mails_seen, 3);
    assert_eq!(report.mails_skipped, 1);
    assert_eq!(report.new_ids, 2);
    assert_eq!(report.apport_discards, 1);
    assert_eq!(announcements.len(), 1);
    assert_eq!(announcements[0].channel, "#ubuntu-bugs");
    assert_eq!(
        announcements[0].line,
        format!(
            "New bug: #40 in gdm3 (main) \"Login loops\" [High,New] {}/bugs/40",
            server.base_url()
        )
    );

    let (report, announcements) = poller.poll_once().await.expect("second cycle");
    assert_eq!(report.candidates, 1);
    assert_eq!(report.new_ids, 0);
    assert!(announcements.is_empty());
    login.assert_calls(1);
    crash.assert_calls(1);
}

#[tokio::test]
async fn integration_links_in_text_resolve_discover_fetch_and_suppress_repeats() {
    let trac_server = MockServer::start();
    let bugzilla_server = MockServer::start();
    let ticket = trac_server.mock(|when, then| {
        when.method(GET).path("/ticket/77").query_param("format", "tab");
        then.status(200)
            .body("summary\tstatus\tcomponent\tpriority\nLeaks memory\taccepted\tworker\tcritical\n");
    });
    let bugzilla_xml = bugzilla_server.mock(|when, then| {
        when.method(GET).path("/xml.cgi").query_param("id", "9");
        then.status(200).body(format!(
            r#"<bugzilla urlbase="{}/"><bug><short_desc>Font glitch</short_desc><bug_status>NEW</bug_status><component>render</component><bug_severity>minor</bug_severity></bug></bugzilla>"#,
            bugzilla_server.base_url()
        ));
    });
    let registry = TrackerRegistry::new(vec![Tracker::new(
        "proj",
        TrackerKind::Trac,
        &format!("{}/ticket", trac_server.base_url()),
        "Proj",
    )]);
    let client = text_mode_client();
    let cache = RepeatSuppressionCache::new(Duration::from_secs(60));
    let text = format!(
        "regressed by {trac}/ticket/77, see also {trac}/ticket/77 and {bugzilla}/show_bug.cgi?id=9",
        trac = trac_server.base_url(),
        bugzilla = bugzilla_server.base_url()
    );
    let options = RenderOptions {
        show_url: false,
        ..RenderOptions::default()
    };

    let mut lines = Vec::new();
    for link in parse_bug_urls(&text, 5) {
        let tracker = registry
            .discover_by_url(&link.url, link.aux.as_deref(), &client)
            .await
            .expect("tracker for link");
        let reports = client.fetch(&tracker, link.id).await.expect("fetch");
        for report in cache.filter_reports("#dev", &tracker.name, reports) {
            lines.push(render_report_line(&tracker.description, &report, options));
        }
    }

    let bugzilla_host = bugzilla_server
        .base_url()
        .trim_start_matches("http://")
        .to_string();
    assert_eq!(
        lines,
        vec![
            "Proj bug 77 in worker \"Leaks memory\" [Critical,Accepted]".to_string(),
            format!("{bugzilla_host} bug 9 in render \"Font glitch\" [Minor,New]"),
        ]
    );
    assert_eq!(registry.len(), 2);
    assert_eq!(
        registry.resolve(&bugzilla_host).expect("discovered tracker").kind,
        TrackerKind::Bugzilla
    );
    ticket.assert_calls(2);
    bugzilla_xml.assert_calls(2);
}
