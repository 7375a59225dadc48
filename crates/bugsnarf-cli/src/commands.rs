use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bugsnarf_reporter::{
    Announcement, ImapMailbox, NewBugPoller, NewBugStore, RepeatSuppressionCache,
};
use bugsnarf_trackers::{
    oops_url, parse_bug_mentions, parse_bug_urls, parse_cve_ids, parse_oops_ids,
    render_lookup_error, render_report_line, BugFetcher, BugReport, MentionTarget, Tracker,
    TrackerClient, TrackerError, TrackerRegistry,
};
use futures_util::future::join_all;
use serde_json::json;
use tokio::sync::{mpsc, watch};

use crate::bot_config::{load_config, save_config, BugsnarfConfig};
use crate::cli_args::{
    Cli, Command, LookupArgs, MentionArgs, PollArgs, TrackersCommand, UrlArgs,
};

/// Links handled from one piece of text.
const MAX_LINKS_PER_MESSAGE: usize = 5;
/// Bug ids handled from one piece of text, across all mentions.
const MAX_MENTIONED_BUGS: usize = 5;

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    match cli.command {
        Command::Lookup(args) => {
            let registry = config.build_registry();
            let client = build_client(&config)?;
            let cache = config.repeat_suppression_cache();
            let lines = lookup_lines(&config, &registry, &client, &cache, &args, cli.json).await?;
            print_lines(&lines);
        }
        Command::Url(args) => {
            let registry = config.build_registry();
            let client = build_client(&config)?;
            let cache = config.repeat_suppression_cache();
            let outcome = url_lines(&config, &registry, &client, &cache, &args, cli.json).await?;
            if outcome.registry_changed {
                persist_trackers(&cli.config, &mut config, &registry)?;
            }
            print_lines(&outcome.lines);
        }
        Command::Mention(args) => {
            let registry = config.build_registry();
            let client = build_client(&config)?;
            let cache = config.repeat_suppression_cache();
            let lines = mention_lines(&config, &registry, &client, &cache, &args, cli.json).await?;
            print_lines(&lines);
        }
        Command::Trackers { command } => {
            let registry = config.build_registry();
            let outcome = tracker_lines(&registry, command, cli.json)?;
            if outcome.registry_changed {
                persist_trackers(&cli.config, &mut config, &registry)?;
            }
            print_lines(&outcome.lines);
        }
        Command::Poll(args) => run_poll(&config, &args, cli.json).await?,
    }
    Ok(())
}

fn build_client(config: &BugsnarfConfig) -> Result<TrackerClient> {
    TrackerClient::new(config.tracker_client_config()).context("failed to build http client")
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn persist_trackers(
    path: &Path,
    config: &mut BugsnarfConfig,
    registry: &TrackerRegistry,
) -> Result<()> {
    config.trackers = registry.list();
    save_config(path, config)?;
    tracing::info!(path = %path.display(), trackers = config.trackers.len(), "saved tracker table");
    Ok(())
}

#[derive(Debug, Default)]
pub(crate) struct CommandOutput {
    pub lines: Vec<String>,
    pub registry_changed: bool,
}

fn report_lines(
    config: &BugsnarfConfig,
    channel: &str,
    tracker: &Tracker,
    reports: Vec<BugReport>,
    show_url: bool,
    json_output: bool,
) -> Result<Vec<String>> {
    let options = config.render_options(channel, show_url);
    reports
        .iter()
        .map(|report| {
            if json_output {
                serde_json::to_string(&json!({"tracker": tracker.name, "report": report}))
                    .context("failed to serialize report")
            } else {
                Ok(render_report_line(&tracker.description, report, options))
            }
        })
        .collect()
}

fn error_line(tracker: &Tracker, id: u64, error: &TrackerError, json_output: bool) -> String {
    let message = render_lookup_error(tracker, id, error);
    if json_output {
        json!({"tracker": tracker.name, "id": id, "error": message}).to_string()
    } else {
        message
    }
}

pub(crate) async fn lookup_lines(
    config: &BugsnarfConfig,
    registry: &TrackerRegistry,
    fetcher: &dyn BugFetcher,
    cache: &RepeatSuppressionCache,
    args: &LookupArgs,
    json_output: bool,
) -> Result<Vec<String>> {
    let target = args
        .tracker
        .clone()
        .unwrap_or_else(|| config.snarf_target(&args.channel));
    let tracker = registry.resolve(&target)?;
    let results = join_all(args.ids.iter().map(|id| fetcher.fetch(&tracker, *id))).await;

    let mut lines = Vec::new();
    for (id, result) in args.ids.iter().copied().zip(results) {
        match result {
            Ok(reports) => {
                let reports = cache.filter_reports(&args.channel, &tracker.name, reports);
                lines.extend(report_lines(config, &args.channel, &tracker, reports, true, json_output)?);
            }
            Err(error) => {
                tracing::debug!(tracker = %tracker.name, bug_id = id, %error, "lookup failed");
                lines.push(error_line(&tracker, id, &error, json_output));
            }
        }
    }
    Ok(lines)
}

pub(crate) async fn url_lines(
    config: &BugsnarfConfig,
    registry: &TrackerRegistry,
    fetcher: &dyn BugFetcher,
    cache: &RepeatSuppressionCache,
    args: &UrlArgs,
    json_output: bool,
) -> Result<CommandOutput> {
    let mut output = CommandOutput::default();
    for link in parse_bug_urls(&args.text, MAX_LINKS_PER_MESSAGE) {
        let known = registry.len();
        let Some(tracker) = registry
            .discover_by_url(&link.url, link.aux.as_deref(), fetcher)
            .await
        else {
            tracing::debug!(url = %link.url, "no tracker serves link");
            continue;
        };
        output.registry_changed |= registry.len() != known;
        match fetcher.fetch(&tracker, link.id).await {
            Ok(reports) => {
                let reports = cache.filter_reports(&args.channel, &tracker.name, reports);
                output.lines.extend(report_lines(
                    config,
                    &args.channel,
                    &tracker,
                    reports,
                    false,
                    json_output,
                )?);
            }
            Err(error) => output
                .lines
                .push(error_line(&tracker, link.id, &error, json_output)),
        }
    }
    Ok(output)
}

/// Picks the tracker a mention refers to. `None` means the mention names a
/// tracker that is not registered and is ignored.
fn mention_tracker(
    registry: &TrackerRegistry,
    target: &MentionTarget,
    default_target: &str,
) -> Option<Result<Tracker, TrackerError>> {
    match target {
        MentionTarget::Required(name) => registry.get(name).map(Ok),
        MentionTarget::Preferred(name) => Some(
            registry
                .get(name)
                .map_or_else(|| registry.resolve(default_target), Ok),
        ),
        MentionTarget::Default => Some(registry.resolve(default_target)),
    }
}

pub(crate) async fn mention_lines(
    config: &BugsnarfConfig,
    registry: &TrackerRegistry,
    client: &TrackerClient,
    cache: &RepeatSuppressionCache,
    args: &MentionArgs,
    json_output: bool,
) -> Result<Vec<String>> {
    let default_target = config.snarf_target(&args.channel);
    let mut lines = Vec::new();
    for mention in parse_bug_mentions(&args.text, MAX_MENTIONED_BUGS) {
        let tracker = match mention_tracker(registry, &mention.target, &default_target) {
            Some(Ok(tracker)) => tracker,
            Some(Err(error)) => {
                tracing::warn!(target_name = %default_target, %error, "snarf target is not registered");
                lines.push(if json_output {
                    json!({"error": error.to_string()}).to_string()
                } else {
                    error.to_string()
                });
                continue;
            }
            None => {
                tracing::debug!(mention = ?mention.target, "mention names an unknown tracker");
                continue;
            }
        };
        let results = join_all(mention.ids.iter().map(|id| client.fetch(&tracker, *id))).await;
        for (id, result) in mention.ids.iter().copied().zip(results) {
            match result {
                Ok(reports) => {
                    let reports = cache.filter_reports(&args.channel, &tracker.name, reports);
                    lines.extend(report_lines(
                        config,
                        &args.channel,
                        &tracker,
                        reports,
                        true,
                        json_output,
                    )?);
                }
                Err(error) => lines.push(error_line(&tracker, id, &error, json_output)),
            }
        }
    }

    for id in parse_oops_ids(&args.text) {
        let url = oops_url(&id);
        lines.push(if json_output {
            json!({"oops": id, "url": url}).to_string()
        } else {
            url
        });
    }

    for id in parse_cve_ids(&args.text) {
        match client.cve_summary(&id).await {
            Ok(Some(summary)) => lines.push(if json_output {
                json!({"cve": summary.id, "description": summary.description, "url": summary.url})
                    .to_string()
            } else {
                summary.line()
            }),
            Ok(None) => tracing::debug!(cve = %id, "cve page has no description"),
            Err(error) => tracing::warn!(cve = %id, %error, "cve lookup failed"),
        }
    }
    Ok(lines)
}

fn describe_tracker(tracker: &Tracker, json_output: bool) -> Result<String> {
    if json_output {
        return serde_json::to_string(tracker).context("failed to serialize tracker");
    }
    Ok(format!(
        "{}: {}, {} [{}]",
        tracker.name, tracker.description, tracker.url, tracker.kind
    ))
}

pub(crate) fn tracker_lines(
    registry: &TrackerRegistry,
    command: TrackersCommand,
    json_output: bool,
) -> Result<CommandOutput> {
    let mut output = CommandOutput::default();
    match command {
        TrackersCommand::List => {
            let trackers = registry.list();
            if json_output {
                for tracker in &trackers {
                    output.lines.push(describe_tracker(tracker, true)?);
                }
            } else {
                let names: Vec<&str> = trackers.iter().map(|tracker| tracker.name.as_str()).collect();
                output.lines.push(names.join(", "));
            }
        }
        TrackersCommand::Show { name } => {
            output
                .lines
                .push(describe_tracker(&registry.resolve(&name)?, json_output)?);
        }
        TrackersCommand::Add {
            name,
            kind,
            url,
            description,
        } => {
            let tracker = registry.add(&name, &kind, &url, description.as_deref())?;
            tracing::info!(tracker = %tracker.name, kind = %tracker.kind, "added tracker");
            output.lines.push(format!("Added bugtracker {}", tracker.name));
            output.registry_changed = true;
        }
        TrackersCommand::Remove { name } => {
            let removed = registry.remove(&name)?;
            tracing::info!(tracker = %removed.name, "removed tracker");
            output.lines.push(format!("Removed bugtracker {}", removed.name));
            output.registry_changed = true;
        }
        TrackersCommand::Rename {
            old_name,
            new_name,
            description,
        } => {
            let renamed = registry.rename(&old_name, &new_name, description.as_deref())?;
            tracing::info!(from = %old_name, to = %renamed.name, "renamed tracker");
            output
                .lines
                .push(format!("Renamed bugtracker {old_name} to {}", renamed.name));
            output.registry_changed = true;
        }
    }
    Ok(output)
}

fn announcement_text(announcement: &Announcement, json_output: bool) -> String {
    if json_output {
        json!({"channel": announcement.channel, "line": announcement.line}).to_string()
    } else {
        format!("{}: {}", announcement.channel, announcement.line)
    }
}

async fn run_poll(config: &BugsnarfConfig, args: &PollArgs, json_output: bool) -> Result<()> {
    let mailbox = config
        .imap_mailbox_config(args.imap_password.as_deref())
        .context("no mailbox configured")?;
    let cache_dir = args
        .cache_dir
        .clone()
        .or_else(|| config.reporter_cache_dir.clone())
        .context("no reporter cache directory configured")?;
    let poller = Arc::new(NewBugPoller::new(
        config.poller_config(),
        Arc::new(config.build_registry()),
        Arc::new(build_client(config)?),
        Arc::new(ImapMailbox::new(mailbox)),
        NewBugStore::new(cache_dir),
    ));

    if args.once {
        let (report, announcements) = poller.poll_once().await?;
        tracing::info!(
            mails_seen = report.mails_seen,
            new_ids = report.new_ids,
            announcements = report.announcements,
            "new bug poll complete"
        );
        for announcement in &announcements {
            println!("{}", announcement_text(announcement, json_output));
        }
        return Ok(());
    }

    let (sink, mut receiver) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn({
        let poller = Arc::clone(&poller);
        async move { poller.run(sink, shutdown_rx).await }
    });
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                let _ = shutdown_tx.send(true);
                break;
            }
            announcement = receiver.recv() => match announcement {
                Some(announcement) => println!("{}", announcement_text(&announcement, json_output)),
                None => break,
            },
        }
    }
    drop(receiver);
    task.await.context("poller task failed")?
}
