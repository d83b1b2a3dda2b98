//! Feature-service querying.
//!
//! This module provides the resilient fetcher, the table query builder,
//! the per-source unit query, and the named report-table lookups.

pub mod fetcher;
pub mod lookups;
pub mod table;
pub mod units;

pub use fetcher::{Fetcher, HttpTransport, RetryPolicy, Transport};
pub use units::query_units;

#[cfg(test)]
pub mod testing {
    //! In-memory transport for tests.

    use super::fetcher::{RawResponse, Transport};
    use anyhow::Result;
    use async_trait::async_trait;
    use reqwest::Url;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Reply = std::result::Result<RawResponse, String>;

    /// Replays scripted replies first, then answers by route. A route
    /// matches when its pattern occurs in the decoded request line
    /// (`path?key=value&...`). Unmatched requests get an empty feature set.
    #[derive(Default)]
    pub struct MockTransport {
        script: Mutex<VecDeque<Reply>>,
        routes: Vec<(String, Reply)>,
        requests: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn scripted(replies: Vec<Reply>) -> Self {
            Self {
                script: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(mut self, pattern: &str, body: serde_json::Value) -> Self {
            self.routes
                .push((pattern.to_string(), Ok(RawResponse::ok(body.to_string()))));
            self
        }

        pub fn fail(mut self, pattern: &str, status: u16) -> Self {
            self.routes.push((
                pattern.to_string(),
                Ok(RawResponse {
                    status,
                    body: "failure".to_string(),
                }),
            ));
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        /// Requests whose decoded line contains `pattern`.
        pub fn requests_matching(&self, pattern: &str) -> Vec<String> {
            self.requests()
                .into_iter()
                .filter(|line| line.contains(pattern))
                .collect()
        }
    }

    pub fn describe(url: &Url) -> String {
        let params: Vec<String> = url
            .query_pairs()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        format!("{}?{}", url.path(), params.join("&"))
    }

    /// Feature-set body with one attributes object per row.
    pub fn features(rows: Vec<serde_json::Value>) -> serde_json::Value {
        let features: Vec<serde_json::Value> = rows
            .into_iter()
            .map(|attributes| serde_json::json!({ "attributes": attributes }))
            .collect();
        serde_json::json!({ "features": features })
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(&self, url: &Url) -> Result<RawResponse> {
            let line = describe(url);
            self.requests.lock().unwrap().push(line.clone());

            let scripted = self.script.lock().unwrap().pop_front();
            let reply = match scripted {
                Some(reply) => reply,
                None => self
                    .routes
                    .iter()
                    .find(|(pattern, _)| line.contains(pattern.as_str()))
                    .map(|(_, reply)| reply.clone())
                    .unwrap_or_else(|| Ok(RawResponse::ok(r#"{"features": []}"#))),
            };

            reply.map_err(|message| anyhow::anyhow!(message))
        }
    }
}
