//! HTTP session with retry
//!
//! This module handles all plain HTTP traffic of the scanner:
//! - Building HTTP clients with the configured user agent
//! - GET and HEAD requests with bounded exponential-backoff retry
//! - URL status probing, including the ArcGIS "atlas" correction
//! - An optional mode that skips TLS certificate verification

mod retry;

pub use retry::RetryPolicy;

use crate::config::{HttpConfig, UserAgentConfig};
use reqwest::{Client, Method, Response};
use std::time::Duration;
use thiserror::Error;

/// Status reported for atlas map-service links that answer HEAD with a failure
/// code while being reachable through their own protocol.
pub const ATLAS_STATUS: u16 = 300;

/// Errors raised by outbound HTTP calls
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} still answered {status} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        status: u16,
        attempts: u32,
    },
}

/// A reusable HTTP session that retries transient failures
///
/// The session is cheap to clone; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    policy: RetryPolicy,
}

impl HttpSession {
    /// Creates a session from the `[http]` and `[user-agent]` sections
    ///
    /// # Arguments
    ///
    /// * `http` - Timeout and retry settings
    /// * `user_agent` - Identification sent with every request
    /// * `skip_tls_verify` - Accept invalid certificates (catalogues with cosmetic TLS issues)
    pub fn new(
        http: &HttpConfig,
        user_agent: &UserAgentConfig,
        skip_tls_verify: bool,
    ) -> Result<Self, HttpError> {
        let client = build_http_client(http, user_agent, skip_tls_verify)?;
        Ok(Self::with_client(client, RetryPolicy::from_config(http)))
    }

    /// Wraps an existing client with a retry policy
    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// The retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends a GET request, retrying transient failures
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.send_with_retry(Method::GET, url).await
    }

    /// Sends a HEAD request, retrying transient failures
    pub async fn head(&self, url: &str) -> Result<Response, HttpError> {
        self.send_with_retry(Method::HEAD, url).await
    }

    /// Returns the status code of a URL, corrected for atlas map services
    ///
    /// Links under `atlas/rest` or `atlas/services` answer HEAD with a generic
    /// failure code even when they work, so any non-404 answer from them is
    /// reported as [`ATLAS_STATUS`]. A status that is still retryable once
    /// retries run out is a status, not an error; only transport failures are.
    pub async fn status_for(&self, url: &str) -> Result<u16, HttpError> {
        let status = match self.head(url).await {
            Ok(response) => response.status().as_u16(),
            Err(HttpError::RetriesExhausted { status, .. }) => status,
            Err(e) => return Err(e),
        };
        Ok(correct_atlas_status(url, status))
    }

    /// Sends one request with the retry policy applied
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Status in retry list | Retry with backoff, then `RetriesExhausted` |
    /// | Connection error / timeout | Retry with backoff, then `Request` |
    /// | Any other status | Returned as is |
    /// | Any other transport error | Immediate `Request` |
    async fn send_with_retry(&self, method: Method, url: &str) -> Result<Response, HttpError> {
        let mut retry = 0;
        loop {
            let result = self.client.request(method.clone(), url).send().await;
            let exhausted = retry >= self.policy.max_retries;

            match result {
                Ok(response) if self.policy.should_retry_status(response.status().as_u16()) => {
                    let status = response.status().as_u16();
                    if exhausted {
                        return Err(HttpError::RetriesExhausted {
                            url: url.to_string(),
                            status,
                            attempts: retry + 1,
                        });
                    }
                    tracing::debug!("{} {} answered {}, retrying", method, url, status);
                }
                Ok(response) => return Ok(response),
                Err(e) if (e.is_connect() || e.is_timeout()) && !exhausted => {
                    tracing::debug!("{} {} failed ({}), retrying", method, url, e);
                }
                Err(e) => {
                    return Err(HttpError::Request {
                        url: url.to_string(),
                        source: e,
                    })
                }
            }

            retry += 1;
            tokio::time::sleep(self.policy.backoff(retry)).await;
        }
    }
}

/// Applies the atlas correction to a raw status code
pub fn correct_atlas_status(url: &str, status: u16) -> u16 {
    if status != 404 && (url.contains("atlas/rest") || url.contains("atlas/services")) {
        ATLAS_STATUS
    } else {
        status
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `http` - Timeout settings
/// * `user_agent` - The user agent configuration
/// * `skip_tls_verify` - Disable certificate verification
pub fn build_http_client(
    http: &HttpConfig,
    user_agent: &UserAgentConfig,
    skip_tls_verify: bool,
) -> Result<Client, HttpError> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(http.timeout))
        .connect_timeout(Duration::from_secs(10))
        .danger_accept_invalid_certs(skip_tls_verify)
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(HttpError::Build)
}
