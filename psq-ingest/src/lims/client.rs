//! Authenticated LIMS request pipeline
//!
//! Every API call goes through [`LimsClient::request`], which attaches the
//! bearer credential and retries transient failures:
//!
//! | Outcome            | Action                                              |
//! |--------------------|-----------------------------------------------------|
//! | 2xx                | return response                                     |
//! | 429                | wait throttle header TTL + 1s (else current delay)  |
//! | 401                | drop credential, wait, re-authenticate next attempt |
//! | timeout            | wait, retry                                         |
//! | other transport    | wait, retry; surfaced on the last attempt           |
//! | other non-2xx      | fail immediately, no retry                          |
//!
//! Delay starts at `initial_delay` and is multiplied by `backoff_factor`
//! after each retried attempt.

use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::token::{AuthError, TokenManager};
use crate::config::LimsSettings;

/// Response header carrying the server's throttle window in seconds
pub const THROTTLE_TTL_HEADER: &str = "X-QBAPI-Throttle-TTL";

/// Longest throttle window honored from the server, in seconds
pub const MAX_THROTTLE_TTL_S: f64 = 3600.0;

const API_PREFIX: &str = "/api/v1";
const USER_AGENT: &str = concat!("psq-ingest/", env!("CARGO_PKG_VERSION"));

/// LIMS client errors
#[derive(Debug, Error)]
pub enum LimsError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus { url: String, status: u16, body: String },

    #[error("Request failed after {attempts} tries: {url}")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("Unreadable response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("HTTP client setup failed: {0}")]
    Setup(String),

    #[error("Cancelled")]
    Cancelled,
}

impl LimsError {
    /// HTTP status for status errors
    pub fn status(&self) -> Option<u16> {
        match self {
            LimsError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Retry/backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    /// Added to the server-provided throttle TTL
    pub throttle_padding: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            throttle_padding: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.backoff_factor.max(1.0))
    }

    /// Wait demanded by a 429 response, when the server announced one
    ///
    /// Announced windows are capped at [`MAX_THROTTLE_TTL_S`]. Negative or
    /// unparseable values yield `None` and the caller keeps its backoff delay.
    fn throttle_wait(&self, headers: &HeaderMap) -> Option<Duration> {
        let ttl = headers
            .get(THROTTLE_TTL_HEADER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|ttl| !ttl.is_nan() && *ttl >= 0.0)?;
        let wait = Duration::try_from_secs_f64(ttl.min(MAX_THROTTLE_TTL_S)).ok()?;
        Some(wait.saturating_add(self.throttle_padding))
    }
}

/// LIMS API client
pub struct LimsClient {
    http_client: reqwest::Client,
    base_url: String,
    token: Mutex<TokenManager>,
    policy: RetryPolicy,
}

impl LimsClient {
    pub fn new(settings: &LimsSettings) -> Result<Self, LimsError> {
        Self::with_policy(settings, RetryPolicy::default())
    }

    pub fn with_policy(settings: &LimsSettings, policy: RetryPolicy) -> Result<Self, LimsError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(policy.request_timeout)
            .build()
            .map_err(|e| LimsError::Setup(e.to_string()))?;

        Ok(Self {
            token: Mutex::new(TokenManager::new(http_client.clone(), settings)),
            http_client,
            base_url: settings.base_url.clone(),
            policy,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Absolute URL for an API path such as `batch/12`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, API_PREFIX, path.trim_start_matches('/'))
    }

    /// True when the next request has to authenticate first
    pub async fn is_token_expired(&self) -> bool {
        self.token.lock().await.is_expired()
    }

    /// Force a fresh credential
    pub async fn authenticate(&self) -> Result<(), LimsError> {
        self.token.lock().await.authenticate().await?;
        Ok(())
    }

    async fn bearer(&self) -> Result<String, LimsError> {
        // Lock held across authenticate so concurrent callers refresh once
        let mut token = self.token.lock().await;
        if token.is_expired() {
            token.authenticate().await?;
        }
        token
            .bearer_header()
            .ok_or_else(|| LimsError::Auth(AuthError("No credential after authentication".to_string())))
    }

    /// Perform an authenticated request with retry
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: Option<&[(&str, &str)]>,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, LimsError> {
        let url = self.api_url(path);
        let attempts = self.policy.max_attempts.max(1);
        let mut delay = self.policy.initial_delay;

        for attempt in 1..=attempts {
            let last_attempt = attempt == attempts;
            let bearer = self.bearer().await?;

            let mut builder = self
                .http_client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, bearer.as_str())
                .timeout(self.policy.request_timeout);
            if let Some(params) = params {
                builder = builder.query(params);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            debug!(method = %method, url = %url, attempt, "LIMS request");

            let wait = match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let wait = self.policy.throttle_wait(response.headers()).unwrap_or(delay);
                        warn!(url = %url, attempt, wait_ms = wait.as_millis() as u64, "LIMS throttled request");
                        wait
                    } else if status == StatusCode::UNAUTHORIZED {
                        warn!(url = %url, attempt, "LIMS rejected credential, re-authenticating");
                        // Another caller may already have replaced the rejected token
                        self.token.lock().await.invalidate_if_current(&bearer);
                        delay
                    } else if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(LimsError::HttpStatus {
                            url,
                            status: status.as_u16(),
                            body,
                        });
                    } else {
                        return Ok(response);
                    }
                }
                Err(e) if e.is_timeout() => {
                    warn!(url = %url, attempt, "LIMS request timed out");
                    delay
                }
                Err(e) => {
                    if last_attempt {
                        return Err(LimsError::Transport { url, source: e });
                    }
                    warn!(url = %url, attempt, error = %e, "LIMS request failed");
                    delay
                }
            };

            if !last_attempt {
                tokio::time::sleep(wait).await;
                delay = self.policy.next_delay(delay);
            }
        }

        Err(LimsError::RetriesExhausted { url, attempts })
    }

    /// GET `path` and decode the body as JSON (empty body reads as null)
    pub async fn get_json(&self, path: &str, params: Option<&[(&str, &str)]>) -> Result<Value, LimsError> {
        let response = self.request(Method::GET, path, params, None).await?;
        let url = response.url().to_string();
        let bytes = response.bytes().await.map_err(|e| LimsError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| LimsError::Decode {
            url,
            message: e.to_string(),
        })
    }
}
