//! Error types for querying and aggregation.

use serde_json::Value;
use thiserror::Error;

/// Failure of a feature-service query after all attempts were used.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Transport failure or non-success HTTP status.
    #[error("request to {url} failed after {attempts} attempt(s){}: {detail}", status_suffix(.status))]
    Network {
        url: String,
        attempts: u32,
        status: Option<u16>,
        detail: String,
    },

    /// HTTP success, but the payload carried an `error` object.
    #[error("service at {url} reported an error after {attempts} attempt(s): {payload}")]
    RemoteData {
        url: String,
        attempts: u32,
        payload: Value,
    },

    /// HTTP success, but the body was not the expected feature set.
    #[error("malformed response from {url} after {attempts} attempt(s): {reason}")]
    MalformedResponse {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// The endpoint could not be turned into a URL.
    #[error("invalid query url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl QueryError {
    /// The URL of the failing request.
    pub fn url(&self) -> &str {
        match self {
            QueryError::Network { url, .. }
            | QueryError::RemoteData { url, .. }
            | QueryError::MalformedResponse { url, .. }
            | QueryError::InvalidUrl { url, .. } => url,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

/// Misuse of the progress registry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProgressError {
    #[error("{0} is already registered as a progress task")]
    DuplicateRegistration(String),
}

/// Any failure that aborts report generation.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Progress(#[from] ProgressError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_network_error_message_includes_url_and_status() {
        let err = QueryError::Network {
            url: "https://example.com/0/query?f=json".to_string(),
            attempts: 3,
            status: Some(503),
            detail: "Service Unavailable".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("https://example.com/0/query?f=json"));
        assert!(message.contains("HTTP 503"));
        assert!(message.contains("3 attempt(s)"));
    }

    #[test]
    fn test_network_error_without_status() {
        let err = QueryError::Network {
            url: "https://example.com".to_string(),
            attempts: 1,
            status: None,
            detail: "connection refused".to_string(),
        };
        assert!(!err.to_string().contains("HTTP"));
    }

    #[test]
    fn test_report_error_wraps_query_error() {
        let err: ReportError = QueryError::RemoteData {
            url: "https://example.com/1".to_string(),
            attempts: 3,
            payload: json!({ "code": 400, "message": "Invalid query" }),
        }
        .into();

        match &err {
            ReportError::Query(inner) => assert_eq!(inner.url(), "https://example.com/1"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("Invalid query"));
    }
}
