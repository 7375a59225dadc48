//! Mail source for bug notifications, with a blocking IMAP implementation.

use std::io::{Read, Write};
use std::net::TcpStream;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

pub const DEFAULT_IMAP_PORT: u16 = 143;
pub const DEFAULT_IMAPS_PORT: u16 = 993;

#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Returns up to `limit` unseen raw messages, oldest first, and flags
    /// each returned message for deletion.
    async fn fetch_unseen(&self, limit: usize) -> Result<Vec<Vec<u8>>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapMailboxConfig {
    pub server: String,
    /// Defaults to 993 with TLS, 143 without.
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub ssl: bool,
}

impl ImapMailboxConfig {
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.ssl {
            DEFAULT_IMAPS_PORT
        } else {
            DEFAULT_IMAP_PORT
        })
    }
}

#[derive(Debug, Clone)]
pub struct ImapMailbox {
    config: ImapMailboxConfig,
}

impl ImapMailbox {
    pub fn new(config: ImapMailboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn fetch_unseen(&self, limit: usize) -> Result<Vec<Vec<u8>>> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_unseen_blocking(&config, limit))
            .await
            .context("imap worker failed")?
    }
}

fn imap_failure(step: &'static str) -> impl FnOnce(imap::Error) -> anyhow::Error {
    move |error| anyhow!("imap {step} failed: {error}")
}

fn fetch_unseen_blocking(config: &ImapMailboxConfig, limit: usize) -> Result<Vec<Vec<u8>>> {
    let address = (config.server.as_str(), config.effective_port());
    tracing::debug!(server = %config.server, port = address.1, ssl = config.ssl, "connecting to imap");
    if config.ssl {
        let tls = native_tls::TlsConnector::builder()
            .build()
            .context("failed to build tls connector")?;
        let client = imap::connect(address, config.server.as_str(), &tls)
            .map_err(imap_failure("connect"))?;
        let mut session = client
            .login(&config.user, &config.password)
            .map_err(|(error, _)| imap_failure("login")(error))?;
        drain_unseen(&mut session, limit)
    } else {
        let stream = TcpStream::connect(address)
            .with_context(|| format!("failed to connect to {}:{}", address.0, address.1))?;
        let mut client = imap::Client::new(stream);
        client.read_greeting().map_err(imap_failure("greeting"))?;
        let mut session = client
            .login(&config.user, &config.password)
            .map_err(|(error, _)| imap_failure("login")(error))?;
        drain_unseen(&mut session, limit)
    }
}

fn drain_unseen<T: Read + Write>(
    session: &mut imap::Session<T>,
    limit: usize,
) -> Result<Vec<Vec<u8>>> {
    session.select("INBOX").map_err(imap_failure("select"))?;
    let mut unseen: Vec<u32> = session
        .search("UNSEEN")
        .map_err(imap_failure("search"))?
        .into_iter()
        .collect();
    unseen.sort_unstable();
    unseen.truncate(limit);

    let mut messages = Vec::with_capacity(unseen.len());
    for sequence in unseen {
        let sequence = sequence.to_string();
        let fetched = session
            .fetch(&sequence, "RFC822")
            .map_err(imap_failure("fetch"))?;
        session
            .store(&sequence, "+FLAGS (\\Deleted)")
            .map_err(imap_failure("store"))?;
        messages.extend(
            fetched
                .iter()
                .filter_map(|message| message.body())
                .map(<[u8]>::to_vec),
        );
    }
    session.logout().map_err(imap_failure("logout"))?;
    tracing::debug!(count = messages.len(), "fetched unseen mail");
    Ok(messages)
}
