//! Shared HTTP transport for every adapter: one pooled client, bounded
//! retries on transient statuses, and raw status/body hand-back so each
//! backend can classify its own failures.

use std::time::Duration;

use tokio::time::sleep;

pub const DEFAULT_USER_AGENT: &str = "bugsnarf-bugtracker/0.1";
const MAX_BACKOFF_SHIFT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Timeout, retry, and identification settings for [`HttpTransport`].
pub struct HttpTransportConfig {
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 15_000,
            max_retries: 1,
            retry_base_delay_ms: 250,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseText {
    pub status: u16,
    pub body: String,
}

impl HttpResponseText {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self { http, config })
    }

    pub async fn get_text(&self, url: &str) -> Result<HttpResponseText, reqwest::Error> {
        self.send_with_retry(|| self.http.get(url)).await
    }

    pub async fn post_soap(
        &self,
        url: &str,
        soap_action: &str,
        envelope: &str,
    ) -> Result<HttpResponseText, reqwest::Error> {
        self.send_with_retry(|| {
            self.http
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
                .header("SOAPAction", format!("\"{soap_action}\""))
                .body(envelope.to_string())
        })
        .await
    }

    async fn send_with_retry<F>(
        &self,
        mut request_builder: F,
    ) -> Result<HttpResponseText, reqwest::Error>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            let response = request_builder().send().await;
            match response {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after_ms = parse_retry_after_ms(response.headers());
                    if attempt < self.config.max_retries && should_retry_status(status) {
                        tracing::debug!(status, attempt, "retrying tracker request");
                        sleep(Duration::from_millis(retry_delay_ms(
                            self.config.retry_base_delay_ms,
                            attempt,
                            retry_after_ms,
                        )))
                        .await;
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    let body = response.text().await?;
                    return Ok(HttpResponseText { status, body });
                }
                Err(error) => {
                    if attempt < self.config.max_retries && is_retryable_transport_error(&error) {
                        tracing::debug!(%error, attempt, "retrying tracker request after transport error");
                        sleep(Duration::from_millis(retry_delay_ms(
                            self.config.retry_base_delay_ms,
                            attempt,
                            None,
                        )))
                        .await;
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }
}

/// Statuses worth a second attempt. 500 is excluded: Trac reports missing
/// tickets that way.
pub fn should_retry_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 502 | 503 | 504)
}

pub fn retry_delay_ms(base_delay_ms: u64, attempt: usize, retry_after_ms: Option<u64>) -> u64 {
    let backoff = base_delay_ms
        .max(1)
        .saturating_mul(1_u64 << attempt.min(MAX_BACKOFF_SHIFT));
    match retry_after_ms {
        Some(retry_after_ms) => backoff.max(retry_after_ms),
        None => backoff,
    }
}

pub fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    raw.parse::<u64>()
        .ok()
        .map(|seconds| seconds.saturating_mul(1_000))
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}
