//! Submission client with retry and rate limiting
//!
//! Each row gets one [`SubmitClient::submit`] call, which owns the attempt
//! loop for that row:
//!
//! - network errors and 5xx responses back off and consume an attempt
//! - 429 with a reset header (or `retry-after`) waits and does not consume one
//! - a duplicate marker in the body ends the row as a duplicate
//! - any other 4xx ends the row as a failure
//!
//! Every request, retries and probes included, waits on the shared limiter.

use super::clock::{Clock, SystemClock};
use super::rate_limit::{retry_after, RateLimitInfo, RateLimiter, RateLimiterConfig};
use super::retry::RetryPolicy;
use crate::error::{Error, Result};
use crate::types::CommentRow;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Submission endpoint, relative to the base URL
pub const SUBMIT_PATH: &str = "api/historical-comments";

/// Longest response body excerpt kept in error messages
const BODY_EXCERPT_CHARS: usize = 300;

/// Configuration for the submission client
#[derive(Debug, Clone)]
pub struct SubmitClientConfig {
    /// API base URL, e.g. `http://localhost:3000`
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Request pacing; `None` disables it
    pub rate_limit: Option<RateLimiterConfig>,
    /// Upper bound for one wait on a rate-limit reset
    pub max_rate_limit_wait: Duration,
    /// Also treat error text mentioning "duplicate" as a duplicate
    pub duplicate_text_heuristic: bool,
    pub user_agent: String,
}

impl Default for SubmitClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            rate_limit: Some(RateLimiterConfig::default()),
            max_rate_limit_wait: Duration::from_secs(3600),
            duplicate_text_heuristic: true,
            user_agent: format!("knesset-import/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SubmitClientConfig {
    /// Create a new config builder
    pub fn builder() -> SubmitClientConfigBuilder {
        SubmitClientConfigBuilder::default()
    }
}

/// Builder for submission client config
#[derive(Default)]
pub struct SubmitClientConfigBuilder {
    config: SubmitClientConfig,
}

impl SubmitClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the API key sent as a bearer token
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Cap a single wait for a rate-limit reset
    pub fn max_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.config.max_rate_limit_wait = wait;
        self
    }

    /// Toggle the error-text duplicate heuristic
    pub fn duplicate_text_heuristic(mut self, enabled: bool) -> Self {
        self.config.duplicate_text_heuristic = enabled;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> SubmitClientConfig {
        self.config
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Final disposition of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Imported,
    Duplicate,
    Failed,
}

/// Result of submitting one row
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub success: bool,
    pub is_duplicate: bool,
    /// Status of the last response, `None` if no response was received
    pub status_code: Option<u16>,
    /// Headers of the last response
    pub headers: HeaderMap,
    pub rate_limit: Option<RateLimitInfo>,
    /// Message of the last failure
    pub error: Option<String>,
    /// Attempts consumed (rate-limit waits not counted)
    pub attempts: u32,
    /// Times the row waited on a 429
    pub rate_limit_waits: u32,
}

impl SubmitOutcome {
    /// Classify the outcome
    pub fn kind(&self) -> OutcomeKind {
        if self.is_duplicate {
            OutcomeKind::Duplicate
        } else if self.success {
            OutcomeKind::Imported
        } else {
            OutcomeKind::Failed
        }
    }
}

/// Body fields the API may return on submission
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    is_duplicate: Option<bool>,
    duplicate: Option<bool>,
    status: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl SubmitResponse {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn flags_duplicate(&self) -> bool {
        self.is_duplicate == Some(true)
            || self.duplicate == Some(true)
            || self
                .status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("duplicate"))
    }

    fn error_text(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// What one failed attempt left behind
struct AttemptFailure {
    status: Option<StatusCode>,
    headers: HeaderMap,
    rate_limit: Option<RateLimitInfo>,
    message: String,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the comment submission API
pub struct SubmitClient {
    client: Client,
    config: SubmitClientConfig,
    rate_limiter: Option<RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl SubmitClient {
    /// Create a client using the system clock
    pub fn new(config: SubmitClientConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a client whose waits go through the given clock
    pub fn with_clock(config: SubmitClientConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        url::Url::parse(&config.base_url)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
            clock,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &SubmitClientConfig {
        &self.config
    }

    /// Clock used for every wait
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Submit one row, retrying transient failures.
    ///
    /// Every attempt, retries included, first waits for the shared rate
    /// limiter. With pacing enabled the real gap between two attempts is
    /// therefore the larger of the backoff delay and the limiter interval
    /// (4 s at the default 1000 requests/hour).
    pub async fn submit(&self, row: &CommentRow) -> SubmitOutcome {
        let url = self.endpoint_url();
        let policy = &self.config.retry;
        let mut attempt: u32 = 1;
        let mut rate_limit_waits: u32 = 0;

        loop {
            self.pace().await;

            let failure = match self.authorize(self.client.post(&url).json(row)).send().await {
                Err(e) => AttemptFailure {
                    status: None,
                    headers: HeaderMap::new(),
                    rate_limit: None,
                    message: format!("Network error: {e}"),
                },
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    let rate_limit = RateLimitInfo::from_headers(&headers);
                    let body = response.text().await.unwrap_or_default();
                    let parsed = SubmitResponse::parse(&body);

                    if self.is_duplicate(status, &parsed) {
                        debug!(url = %row.source_url, "Duplicate comment");
                        return SubmitOutcome {
                            success: false,
                            is_duplicate: true,
                            status_code: Some(status.as_u16()),
                            headers,
                            rate_limit,
                            error: None,
                            attempts: attempt,
                            rate_limit_waits,
                        };
                    }

                    if status.is_success() {
                        return SubmitOutcome {
                            success: true,
                            is_duplicate: false,
                            status_code: Some(status.as_u16()),
                            headers,
                            rate_limit,
                            error: None,
                            attempts: attempt,
                            rate_limit_waits,
                        };
                    }

                    let message = match parsed.error_text() {
                        Some(text) => format!("HTTP {}: {text}", status.as_u16()),
                        None => format!("HTTP {}: {}", status.as_u16(), excerpt(&body)),
                    };

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if let Some(wait) = self.rate_limit_wait(&headers, rate_limit.as_ref()) {
                            warn!(
                                "Rate limited (429) on {}, waiting {:?} before retrying",
                                row.source_url, wait
                            );
                            self.clock.sleep(wait).await;
                            rate_limit_waits += 1;
                            continue;
                        }
                    } else if !status.is_server_error() {
                        return SubmitOutcome {
                            success: false,
                            is_duplicate: false,
                            status_code: Some(status.as_u16()),
                            headers,
                            rate_limit,
                            error: Some(message),
                            attempts: attempt,
                            rate_limit_waits,
                        };
                    }

                    AttemptFailure {
                        status: Some(status),
                        headers,
                        rate_limit,
                        message,
                    }
                }
            };

            if !policy.can_retry(attempt) {
                return SubmitOutcome {
                    success: false,
                    is_duplicate: false,
                    status_code: failure.status.map(|s| s.as_u16()),
                    headers: failure.headers,
                    rate_limit: failure.rate_limit,
                    error: Some(failure.message),
                    attempts: attempt,
                    rate_limit_waits,
                };
            }

            let delay = policy.delay_for(attempt);
            warn!(
                "{}, attempt {}/{}, retrying in {:?}",
                failure.message, attempt, policy.max_attempts, delay
            );
            self.clock.sleep(delay).await;
            attempt += 1;
        }
    }

    /// Fetch the current quota with a lightweight read
    pub async fn probe_rate_limit(&self) -> Result<Option<RateLimitInfo>> {
        self.pace().await;

        let response = self
            .authorize(self.client.get(self.endpoint_url()).query(&[("limit", "1")]))
            .send()
            .await?;

        let info = RateLimitInfo::from_headers(response.headers());
        if info.is_none() && !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status, excerpt(&body)));
        }

        debug!("Rate limit probe: {:?}", info);
        Ok(info)
    }

    fn endpoint_url(&self) -> String {
        format!("{}/{SUBMIT_PATH}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn pace(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    fn is_duplicate(&self, status: StatusCode, body: &SubmitResponse) -> bool {
        if body.flags_duplicate() {
            return true;
        }
        self.config.duplicate_text_heuristic
            && !status.is_success()
            && body
                .error_text()
                .is_some_and(|t| t.to_lowercase().contains("duplicate"))
    }

    /// How long to wait on a 429; `None` means treat it like a 5xx
    fn rate_limit_wait(&self, headers: &HeaderMap, info: Option<&RateLimitInfo>) -> Option<Duration> {
        let wait = info
            .and_then(|i| i.wait_until_reset(self.clock.now()))
            .or_else(|| retry_after(headers))?;
        Some(wait.min(self.config.max_rate_limit_wait))
    }
}

impl std::fmt::Debug for SubmitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitClient")
            .field("base_url", &self.config.base_url)
            .field("has_api_key", &self.config.api_key.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{cut}...")
    }
}
