//! Resilient GET against feature-service query endpoints.
//!
//! A request fails when the transport errors, the status is not a
//! success, the payload carries an `error` object, or the payload cannot
//! be turned into the caller's output. Any failure retries the whole
//! operation, up to a fixed number of attempts with a fixed delay.

use crate::error::QueryError;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw HTTP outcome handed back by a transport.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    #[cfg(test)]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one GET. Errors are transport-level only.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawResponse>;
}

/// Transport backed by reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hazard-report/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!("request timed out")
            } else if e.is_connect() {
                anyhow::anyhow!("cannot connect to {}", url.host_str().unwrap_or("host"))
            } else {
                anyhow::anyhow!("failed to send request: {}", e)
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read response body: {}", e))?;
        Ok(RawResponse { status, body })
    }
}

/// Retry settings for the fetcher.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(100),
        }
    }
}

/// Why a single attempt failed.
#[derive(Debug)]
enum AttemptFailure {
    Transport(String),
    Status { status: u16, body: String },
    Remote(Value),
    Malformed(String),
}

impl AttemptFailure {
    fn into_error(self, url: &Url, attempts: u32) -> QueryError {
        let url = url.to_string();
        match self {
            AttemptFailure::Transport(detail) => QueryError::Network {
                url,
                attempts,
                status: None,
                detail,
            },
            AttemptFailure::Status { status, body } => QueryError::Network {
                url,
                attempts,
                status: Some(status),
                detail: body,
            },
            AttemptFailure::Remote(payload) => QueryError::RemoteData {
                url,
                attempts,
                payload,
            },
            AttemptFailure::Malformed(reason) => QueryError::MalformedResponse {
                url,
                attempts,
                reason,
            },
        }
    }
}

/// Stateless resilient fetcher over a transport.
pub struct Fetcher<T: Transport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch and return the parsed JSON payload.
    #[cfg(test)]
    pub async fn fetch(&self, url: &Url) -> Result<Value, QueryError> {
        self.fetch_with(url, |payload| Ok(payload.clone())).await
    }

    /// Fetch and shape the payload with `extract`. An `Err` from
    /// `extract` counts as a failed attempt.
    pub async fn fetch_with<R, F>(&self, url: &Url, extract: F) -> Result<R, QueryError>
    where
        F: Fn(&Value) -> Result<R, String>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("GET {} (attempt {}/{})", url, attempt, max_attempts);

            let failure = match self.attempt(url, &extract).await {
                Ok(output) => return Ok(output),
                Err(failure) => failure,
            };

            if attempt >= max_attempts {
                return Err(failure.into_error(url, attempt));
            }

            warn!(
                "Query attempt {}/{} failed for {}: {:?}",
                attempt, max_attempts, url, failure
            );
            if !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        }
    }

    async fn attempt<R, F>(&self, url: &Url, extract: &F) -> Result<R, AttemptFailure>
    where
        F: Fn(&Value) -> Result<R, String>,
    {
        let response = self
            .transport
            .get(url)
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(AttemptFailure::Status {
                status: response.status,
                body: response.body,
            });
        }

        let payload: Value = serde_json::from_str(&response.body)
            .map_err(|e| AttemptFailure::Malformed(format!("invalid JSON: {}", e)))?;

        if let Some(error) = payload.get("error") {
            return Err(AttemptFailure::Remote(error.clone()));
        }

        extract(&payload).map_err(AttemptFailure::Malformed)
    }
}

/// Attribute records of every feature in a query response.
pub fn feature_attributes(payload: &Value) -> Result<Vec<serde_json::Map<String, Value>>, String> {
    let features = payload
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| "response has no features array".to_string())?;

    features
        .iter()
        .map(|feature| {
            feature
                .get("attributes")
                .and_then(Value::as_object)
                .cloned()
                .ok_or_else(|| "feature has no attributes object".to_string())
        })
        .collect()
}
