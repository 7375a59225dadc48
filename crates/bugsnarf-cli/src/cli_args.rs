use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "bugsnarf",
    about = "Look up bugs across remote trackers and announce newly filed ones",
    version
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "BUGSNARF_CONFIG",
        default_value = ".bugsnarf/config.json",
        help = "JSON configuration file; created by tracker admin commands when missing"
    )]
    pub config: PathBuf,

    #[arg(long, global = true, help = "Emit machine-readable JSON instead of text lines")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch bugs by id from one tracker
    Lookup(LookupArgs),
    /// Find tracker links in text and report the bugs they point at
    Url(UrlArgs),
    /// Find bug, OOPS, and CVE mentions such as "bug 123" or "(LP: #123)"
    Mention(MentionArgs),
    /// Inspect or edit the tracker table
    Trackers {
        #[command(subcommand)]
        command: TrackersCommand,
    },
    /// Read bug-notification mail and print new-bug announcements
    Poll(PollArgs),
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    #[arg(
        long,
        short = 't',
        help = "Tracker name or unique prefix; defaults to the channel's or the global snarf target"
    )]
    pub tracker: Option<String>,

    #[arg(long, default_value = "", help = "Channel whose display and repeat settings apply")]
    pub channel: String,

    #[arg(required = true, num_args = 1.., help = "Bug ids")]
    pub ids: Vec<u64>,
}

#[derive(Debug, Args)]
pub struct UrlArgs {
    #[arg(long, default_value = "", help = "Channel whose display and repeat settings apply")]
    pub channel: String,

    #[arg(help = "Text containing bug links")]
    pub text: String,
}

#[derive(Debug, Args)]
pub struct MentionArgs {
    #[arg(
        long,
        default_value = "",
        help = "Channel whose snarf target, display, and repeat settings apply"
    )]
    pub channel: String,

    #[arg(help = "Chat text that may mention bugs")]
    pub text: String,
}

#[derive(Debug, Subcommand)]
pub enum TrackersCommand {
    /// List registered trackers
    List,
    /// Show one tracker
    Show { name: String },
    /// Register or replace a tracker
    Add {
        name: String,
        kind: String,
        url: String,
        description: Option<String>,
    },
    /// Remove a tracker
    Remove { name: String },
    /// Rename a tracker, optionally replacing its description
    Rename {
        old_name: String,
        new_name: String,
        description: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct PollArgs {
    #[arg(
        long,
        env = "BUGSNARF_POLL_ONCE",
        default_value_t = false,
        help = "Run a single poll cycle and exit"
    )]
    pub once: bool,

    #[arg(
        long = "cache-dir",
        env = "BUGSNARF_REPORTER_CACHE",
        help = "Marker directory for announced bugs; overrides the configured reporter cache"
    )]
    pub cache_dir: Option<PathBuf>,

    #[arg(
        long = "imap-password",
        env = "BUGSNARF_IMAP_PASSWORD",
        hide_env_values = true,
        help = "Mailbox password; overrides the configured one"
    )]
    pub imap_password: Option<String>,
}
