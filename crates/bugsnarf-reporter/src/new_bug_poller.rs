//! Periodic mailbox-driven announcement of newly filed bugs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bugsnarf_trackers::{render_report_line, BugFetcher, RenderOptions, TrackerRegistry};
use tokio::sync::{mpsc, watch};

use crate::bug_notification::parse_bug_notification;
use crate::mailbox::Mailbox;
use crate::new_bug_store::NewBugStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_MAIL_BATCH_LIMIT: usize = 20;
const APPORT_MARKER: &str = "[apport]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Upper bound on one cycle, mailbox and fetches included.
    pub cycle_timeout: Duration,
    /// Registry name of the tracker notifications refer to.
    pub launchpad_tracker: String,
    /// Channel name to the project tags it wants announced.
    pub subscriptions: BTreeMap<String, Vec<String>>,
    pub mail_batch_limit: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            launchpad_tracker: "launchpad".to_string(),
            subscriptions: BTreeMap::new(),
            mail_batch_limit: DEFAULT_MAIL_BATCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub channel: String,
    pub line: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollCycleReport {
    pub mails_seen: usize,
    pub mails_skipped: usize,
    pub candidates: usize,
    pub new_ids: usize,
    pub fetch_failures: usize,
    pub apport_discards: usize,
    pub announcements: usize,
}

/// `"Launchpad bug 5 in x ..."` becomes `"New bug: #5 in x ..."`.
pub fn announcement_line(rendered: &str) -> String {
    let rest = rendered
        .find("bug ")
        .map_or(rendered, |index| &rendered[index + "bug ".len()..]);
    format!("New bug: #{rest}")
}

pub struct NewBugPoller {
    config: PollerConfig,
    registry: Arc<TrackerRegistry>,
    fetcher: Arc<dyn BugFetcher>,
    mailbox: Arc<dyn Mailbox>,
    store: NewBugStore,
}

impl NewBugPoller {
    pub fn new(
        config: PollerConfig,
        registry: Arc<TrackerRegistry>,
        fetcher: Arc<dyn BugFetcher>,
        mailbox: Arc<dyn Mailbox>,
        store: NewBugStore,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
            mailbox,
            store,
        }
    }

    /// Runs one mailbox pass and returns the announcements it produced,
    /// grouped by channel and ordered by ascending bug id.
    pub async fn poll_once(&self) -> Result<(PollCycleReport, Vec<Announcement>)> {
        let mut report = PollCycleReport::default();
        let tracker = self
            .registry
            .resolve(&self.config.launchpad_tracker)
            .with_context(|| {
                format!(
                    "new-bug tracker '{}' is not registered",
                    self.config.launchpad_tracker
                )
            })?;
        let mails = self
            .mailbox
            .fetch_unseen(self.config.mail_batch_limit)
            .await
            .context("failed to read bug notification mail")?;

        let mut new_bugs: BTreeMap<String, BTreeMap<u64, String>> = BTreeMap::new();
        for raw in mails {
            report.mails_seen += 1;
            let notification = match parse_bug_notification(&raw) {
                Ok(notification) => notification,
                Err(skip) => {
                    report.mails_skipped += 1;
                    tracing::debug!(reason = %skip, "ignoring mail");
                    continue;
                }
            };
            report.candidates += 1;
            let bug_id = notification.bug_id;
            if !self.mark_new(&tracker.name, &notification.tag, bug_id).await? {
                continue;
            }
            report.new_ids += 1;

            let primary = match self.fetcher.fetch(&tracker, bug_id).await {
                Ok(reports) => reports.into_iter().next(),
                Err(error) => {
                    report.fetch_failures += 1;
                    if error.is_retryable() {
                        tracing::warn!(tracker = %tracker.name, bug_id, %error, "unable to fetch new bug");
                    } else {
                        tracing::debug!(tracker = %tracker.name, bug_id, %error, "new bug is not fetchable");
                    }
                    continue;
                }
            };
            let Some(primary) = primary else {
                report.fetch_failures += 1;
                continue;
            };
            let mut line = render_report_line(
                &tracker.description,
                &primary,
                RenderOptions {
                    show_extended: false,
                    show_assignee: false,
                    show_url: true,
                },
            );
            if let Some(component) = &notification.component {
                line = line.replacen('"', &format!("({component}) \""), 1);
            }
            if line.contains(APPORT_MARKER) {
                report.apport_discards += 1;
                tracing::debug!(bug_id, "discarding apport bug");
                continue;
            }
            new_bugs
                .entry(notification.tag)
                .or_default()
                .insert(bug_id, line);
        }

        let mut announcements = Vec::new();
        for (channel, tags) in &self.config.subscriptions {
            let mut lines: BTreeMap<u64, &str> = BTreeMap::new();
            for tag in tags {
                if let Some(bugs) = new_bugs.get(tag.trim()) {
                    lines.extend(bugs.iter().map(|(id, line)| (*id, line.as_str())));
                }
            }
            announcements.extend(lines.into_values().map(|line| Announcement {
                channel: channel.clone(),
                line: announcement_line(line),
            }));
        }
        report.announcements = announcements.len();
        Ok((report, announcements))
    }

    /// Marker creation touches the filesystem, so it runs on the blocking pool.
    async fn mark_new(&self, tracker: &str, tag: &str, bug_id: u64) -> Result<bool> {
        let store = self.store.clone();
        let tracker = tracker.to_string();
        let tag = tag.to_string();
        tokio::task::spawn_blocking(move || store.is_new(&tracker, &tag, bug_id))
            .await
            .context("new bug marker task failed")?
    }

    /// Polls until `shutdown` turns true or the announcement receiver goes
    /// away. A failed or timed-out cycle is logged and the next one runs on
    /// schedule; a shutdown during a cycle abandons it.
    pub async fn run(
        &self,
        sink: mpsc::Sender<Announcement>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            let outcome = tokio::select! {
                outcome = tokio::time::timeout(self.config.cycle_timeout, self.poll_once()) => outcome,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("new bug poller shutdown requested mid-cycle");
                        return Ok(());
                    }
                    continue;
                }
            };
            match outcome {
                Ok(Ok((report, announcements))) => {
                    tracing::info!(
                        mails_seen = report.mails_seen,
                        mails_skipped = report.mails_skipped,
                        candidates = report.candidates,
                        new_ids = report.new_ids,
                        fetch_failures = report.fetch_failures,
                        apport_discards = report.apport_discards,
                        announcements = report.announcements,
                        "new bug poll complete"
                    );
                    for announcement in announcements {
                        if sink.send(announcement).await.is_err() {
                            tracing::info!("announcement receiver closed; stopping poller");
                            return Ok(());
                        }
                    }
                }
                Ok(Err(error)) => {
                    tracing::warn!(error = %format!("{error:#}"), "new bug poll failed");
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.config.cycle_timeout.as_millis() as u64,
                        "new bug poll timed out"
                    );
                }
            }

            if *shutdown.borrow() {
                return Ok(());
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("new bug poller shutdown requested");
                        return Ok(());
                    }
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}
