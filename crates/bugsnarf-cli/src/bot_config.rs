//! JSON configuration file: trackers, per-channel display settings, the
//! mailbox, and transport tuning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bugsnarf_core::write_json_atomic;
use bugsnarf_reporter::{ImapMailboxConfig, PollerConfig, RepeatSuppressionCache};
use bugsnarf_trackers::advisory_links::DEFAULT_CVE_LOOKUP_URL;
use bugsnarf_trackers::http_transport::DEFAULT_USER_AGENT;
use bugsnarf_trackers::tracker::{DEFAULT_DEBBUGS_SOAP_URL, DEFAULT_SOURCEFORGE_ITEM_URL};
use bugsnarf_trackers::{
    builtin_trackers, HttpTransportConfig, LaunchpadOptions, RenderOptions, Tracker,
    TrackerClientConfig, TrackerRegistry,
};
use serde::{Deserialize, Serialize};

pub const BUGSNARF_CONFIG_SCHEMA_VERSION: u32 = 1;

fn bugsnarf_config_schema_version() -> u32 {
    BUGSNARF_CONFIG_SCHEMA_VERSION
}

fn default_snarf_target() -> String {
    "launchpad".to_string()
}

fn default_repeat_delay_secs() -> u64 {
    900
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_cycle_timeout_secs() -> u64 {
    300
}

fn default_new_bug_tracker() -> String {
    "launchpad".to_string()
}

fn default_http_timeout_ms() -> u64 {
    15_000
}

fn default_http_max_retries() -> usize {
    1
}

fn default_http_retry_base_delay_ms() -> u64 {
    250
}

fn default_http_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_sourceforge_item_url() -> String {
    DEFAULT_SOURCEFORGE_ITEM_URL.to_string()
}

fn default_debbugs_soap_url() -> String {
    DEFAULT_DEBBUGS_SOAP_URL.to_string()
}

fn default_cve_lookup_url() -> String {
    DEFAULT_CVE_LOOKUP_URL.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelSettings {
    #[serde(default)]
    pub repeat_delay_secs: Option<u64>,
    #[serde(default)]
    pub extended: bool,
    #[serde(default)]
    pub show_assignee: bool,
    #[serde(default)]
    pub snarf_target: Option<String>,
    /// Project tags whose new bugs are announced here.
    #[serde(default)]
    pub reporter_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailboxSettings {
    pub server: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ssl: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpSettings {
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_http_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_http_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_http_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_http_timeout_ms(),
            max_retries: default_http_max_retries(),
            retry_base_delay_ms: default_http_retry_base_delay_ms(),
            user_agent: default_http_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BugsnarfConfig {
    #[serde(default = "bugsnarf_config_schema_version")]
    pub schema_version: u32,
    /// Empty means the built-in tracker table.
    #[serde(default)]
    pub trackers: Vec<Tracker>,
    #[serde(default = "default_snarf_target")]
    pub default_snarf_target: String,
    #[serde(default = "default_repeat_delay_secs")]
    pub repeat_delay_secs: u64,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelSettings>,
    #[serde(default)]
    pub mailbox: Option<MailboxSettings>,
    #[serde(default)]
    pub reporter_cache_dir: Option<PathBuf>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,
    #[serde(default = "default_new_bug_tracker")]
    pub new_bug_tracker: String,
    #[serde(default)]
    pub launchpad: LaunchpadOptions,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default = "default_sourceforge_item_url")]
    pub sourceforge_item_url: String,
    #[serde(default = "default_debbugs_soap_url")]
    pub debbugs_soap_url: String,
    #[serde(default = "default_cve_lookup_url")]
    pub cve_lookup_url: String,
}

impl Default for BugsnarfConfig {
    fn default() -> Self {
        Self {
            schema_version: BUGSNARF_CONFIG_SCHEMA_VERSION,
            trackers: Vec::new(),
            default_snarf_target: default_snarf_target(),
            repeat_delay_secs: default_repeat_delay_secs(),
            channels: BTreeMap::new(),
            mailbox: None,
            reporter_cache_dir: None,
            poll_interval_secs: default_poll_interval_secs(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            new_bug_tracker: default_new_bug_tracker(),
            launchpad: LaunchpadOptions::default(),
            http: HttpSettings::default(),
            sourceforge_item_url: default_sourceforge_item_url(),
            debbugs_soap_url: default_debbugs_soap_url(),
            cve_lookup_url: default_cve_lookup_url(),
        }
    }
}

/// Reads the configuration; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<BugsnarfConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file missing; using defaults");
        return Ok(BugsnarfConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: BugsnarfConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if config.schema_version != BUGSNARF_CONFIG_SCHEMA_VERSION {
        bail!(
            "unsupported config schema_version {} in {} (expected {})",
            config.schema_version,
            path.display(),
            BUGSNARF_CONFIG_SCHEMA_VERSION
        );
    }
    Ok(config)
}

pub fn save_config(path: &Path, config: &BugsnarfConfig) -> Result<()> {
    write_json_atomic(path, config)
}

impl BugsnarfConfig {
    pub fn channel(&self, channel: &str) -> ChannelSettings {
        self.channels.get(channel).cloned().unwrap_or_default()
    }

    pub fn build_registry(&self) -> TrackerRegistry {
        if self.trackers.is_empty() {
            TrackerRegistry::new(builtin_trackers())
        } else {
            TrackerRegistry::new(self.trackers.iter().cloned())
        }
    }

    pub fn tracker_client_config(&self) -> TrackerClientConfig {
        TrackerClientConfig {
            http: HttpTransportConfig {
                request_timeout_ms: self.http.timeout_ms,
                max_retries: self.http.max_retries,
                retry_base_delay_ms: self.http.retry_base_delay_ms,
                user_agent: self.http.user_agent.clone(),
            },
            launchpad: self.launchpad.clone(),
            debbugs_soap_url: self.debbugs_soap_url.clone(),
            sourceforge_item_url: self.sourceforge_item_url.clone(),
            cve_lookup_url: self.cve_lookup_url.clone(),
        }
    }

    pub fn repeat_suppression_cache(&self) -> RepeatSuppressionCache {
        self.channels.iter().fold(
            RepeatSuppressionCache::new(Duration::from_secs(self.repeat_delay_secs)),
            |cache, (channel, settings)| match settings.repeat_delay_secs {
                Some(secs) => cache.with_channel_window(channel, Duration::from_secs(secs)),
                None => cache,
            },
        )
    }

    /// Snarf target for `channel`, falling back to the global default.
    pub fn snarf_target(&self, channel: &str) -> String {
        self.channels
            .get(channel)
            .and_then(|settings| settings.snarf_target.clone())
            .unwrap_or_else(|| self.default_snarf_target.clone())
    }

    pub fn render_options(&self, channel: &str, show_url: bool) -> RenderOptions {
        let settings = self.channel(channel);
        RenderOptions {
            show_extended: settings.extended,
            show_assignee: settings.show_assignee,
            show_url,
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            cycle_timeout: Duration::from_secs(self.cycle_timeout_secs),
            launchpad_tracker: self.new_bug_tracker.clone(),
            subscriptions: self
                .channels
                .iter()
                .filter(|(_, settings)| !settings.reporter_tags.is_empty())
                .map(|(channel, settings)| (channel.clone(), settings.reporter_tags.clone()))
                .collect(),
            ..PollerConfig::default()
        }
    }

    pub fn imap_mailbox_config(&self, password_override: Option<&str>) -> Option<ImapMailboxConfig> {
        let mailbox = self.mailbox.as_ref()?;
        Some(ImapMailboxConfig {
            server: mailbox.server.clone(),
            port: mailbox.port,
            user: mailbox.user.clone(),
            password: password_override
                .map(str::to_string)
                .unwrap_or_else(|| mailbox.password.clone()),
            ssl: mailbox.ssl,
        })
    }
}
