//! Filtered, field-projected queries against report tables.

use super::fetcher::{feature_attributes, Fetcher, Transport};
use crate::error::QueryError;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Clause used when a code list is empty; matches no rows.
pub const MATCH_NOTHING: &str = "1=0";

/// Clause matching every row.
pub const MATCH_ALL: &str = "1=1";

/// Build `field IN ('a','b')`. Codes are inserted verbatim and must
/// already be safe; only generated hazard/unit codes are passed here.
/// An empty list yields [`MATCH_NOTHING`].
pub fn in_clause<S: AsRef<str>>(field: &str, codes: &[S]) -> String {
    if codes.is_empty() {
        return MATCH_NOTHING.to_string();
    }

    let quoted: Vec<String> = codes
        .iter()
        .map(|code| format!("'{}'", code.as_ref()))
        .collect();
    format!("{} IN ({})", field, quoted.join(","))
}

/// Query endpoint for a layer or table URL.
pub(crate) fn query_endpoint(base: &str, params: &[(&str, String)]) -> Result<Url, QueryError> {
    let endpoint = format!("{}/query", base.trim_end_matches('/'));
    Url::parse_with_params(&endpoint, params).map_err(|e| QueryError::InvalidUrl {
        url: endpoint,
        reason: e.to_string(),
    })
}

/// A query against one report table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    table_url: String,
    where_clause: String,
    out_fields: Vec<String>,
    order_by: Option<String>,
}

impl TableQuery {
    pub fn new(table_url: impl Into<String>, where_clause: impl Into<String>) -> Self {
        Self {
            table_url: table_url.into(),
            where_clause: where_clause.into(),
            out_fields: Vec::new(),
            order_by: None,
        }
    }

    pub fn out_fields(mut self, fields: &[&str]) -> Self {
        self.out_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Sort expression, e.g. `Order_ ASC`.
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    /// The full query URL. Geometry is never requested.
    pub fn to_url(&self) -> Result<Url, QueryError> {
        let mut params = vec![
            ("where", self.where_clause.clone()),
            ("outFields", self.out_fields.join(",")),
            ("f", "json".to_string()),
        ];
        if let Some(ref order) = self.order_by {
            params.push(("orderByFields", order.clone()));
        }
        query_endpoint(&self.table_url, &params)
    }

    /// Run the query and return the attribute record of every feature.
    pub async fn run<T: Transport>(
        &self,
        fetcher: &Fetcher<T>,
    ) -> Result<Vec<Map<String, Value>>, QueryError> {
        let url = self.to_url()?;
        debug!("Table query: {} where {}", self.table_url, self.where_clause);
        fetcher.fetch_with(&url, feature_attributes).await
    }

    /// Run the query and deserialize each attribute record into `R`.
    ///
    /// Records that do not fit `R` are skipped with a warning; they are
    /// not retried, since a repeat request returns the same row.
    pub async fn run_as<T: Transport, R: DeserializeOwned>(
        &self,
        fetcher: &Fetcher<T>,
    ) -> Result<Vec<R>, QueryError> {
        let records = self.run(fetcher).await?;
        Ok(decode_rows(&self.table_url, records))
    }
}

fn decode_rows<R: DeserializeOwned>(table_url: &str, records: Vec<Map<String, Value>>) -> Vec<R> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            match serde_json::from_value(Value::Object(record)) {
                Ok(row) => Some(row),
                Err(e) => {
                    warn!("Skipping row {} of {}: {}", index, table_url, e);
                    None
                }
            }
        })
        .collect()
}

/// Query a table and return its rows, optionally sorted server-side.
pub async fn query_table<T: Transport, R: DeserializeOwned>(
    fetcher: &Fetcher<T>,
    table_url: &str,
    where_clause: &str,
    out_fields: &[&str],
    order_by: Option<&str>,
) -> Result<Vec<R>, QueryError> {
    let mut query = TableQuery::new(table_url, where_clause).out_fields(out_fields);
    if let Some(order) = order_by {
        query = query.order_by(order);
    }
    query.run_as(fetcher).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportTextRow;
    use crate::query::fetcher::RetryPolicy;
    use crate::query::testing::{features, MockTransport};
    use serde_json::json;
    use std::time::Duration;

    fn fetcher(transport: MockTransport) -> Fetcher<MockTransport> {
        Fetcher::new(
            transport,
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_in_clause() {
        assert_eq!(
            in_clause("HazardCode", &["FLH", "LSS"]),
            "HazardCode IN ('FLH','LSS')"
        );
        assert_eq!(in_clause("Hazard", &["EGS".to_string()]), "Hazard IN ('EGS')");
    }

    #[test]
    fn test_in_clause_empty_matches_nothing() {
        let empty: [&str; 0] = [];
        assert_eq!(in_clause("HazardUnit", &empty), "1=0");
    }

    #[test]
    fn test_query_url_parameters() {
        let query = TableQuery::new(
            "https://example.com/Report_Tables/FeatureServer/1/",
            in_clause("HazardGroup", &["Flooding"]),
        )
        .out_fields(&["HazardGroup", "Text"])
        .order_by("Order_ ASC");

        let url = query.to_url().unwrap();
        assert_eq!(url.path(), "/Report_Tables/FeatureServer/1/query");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("where".to_string(), "HazardGroup IN ('Flooding')".to_string()),
                ("outFields".to_string(), "HazardGroup,Text".to_string()),
                ("f".to_string(), "json".to_string()),
                ("orderByFields".to_string(), "Order_ ASC".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_url_without_order() {
        let url = TableQuery::new("https://example.com/t/0", MATCH_ALL)
            .out_fields(&["Section", "Text"])
            .to_url()
            .unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "orderByFields"));
        assert!(url.query_pairs().any(|(k, v)| k == "where" && v == "1=1"));
    }

    #[test]
    fn test_invalid_table_url() {
        let err = TableQuery::new("not a url", MATCH_ALL).to_url().unwrap_err();
        assert!(matches!(err, QueryError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_run_returns_attribute_records() {
        let transport = MockTransport::new().route(
            "/t/8/query",
            features(vec![
                json!({ "Section": "Top", "Text": "Intro" }),
                json!({ "Section": "Bottom", "Text": null }),
            ]),
        );
        let fetcher = fetcher(transport);

        let rows = TableQuery::new("https://example.com/t/8", MATCH_ALL)
            .out_fields(&["Section", "Text"])
            .run(&fetcher)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Section"], "Top");

        let typed: Vec<ReportTextRow> = query_table(
            &fetcher,
            "https://example.com/t/8",
            MATCH_ALL,
            &["Section", "Text"],
            None,
        )
        .await
        .unwrap();
        assert_eq!(typed[1].section.as_deref(), Some("Bottom"));
        assert_eq!(typed[1].text, None);
    }

    #[tokio::test]
    async fn test_null_key_column_is_kept() {
        let transport = MockTransport::new().route(
            "/t/8/query",
            features(vec![json!({ "Section": null, "Text": "Orphan" })]),
        );
        let fetcher = fetcher(transport);

        let rows: Vec<ReportTextRow> =
            query_table(&fetcher, "https://example.com/t/8", MATCH_ALL, &["Section", "Text"], None)
                .await
                .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].section, None);
        assert_eq!(fetcher.transport().request_count(), 1);
    }

    #[tokio::test]
    async fn test_wrong_row_shape_is_skipped_without_retry() {
        let transport = MockTransport::new().route(
            "/t/8/query",
            features(vec![
                json!({ "Section": 5, "Text": "Bad" }),
                json!({ "Section": "Top", "Text": "Good" }),
            ]),
        );
        let fetcher = fetcher(transport);

        let rows = TableQuery::new("https://example.com/t/8", MATCH_ALL)
            .run_as::<_, ReportTextRow>(&fetcher)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text.as_deref(), Some("Good"));
        assert_eq!(fetcher.transport().request_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_feature_set_is_retried() {
        let transport = MockTransport::new().route("/t/8/query", json!({ "rows": [] }));
        let fetcher = fetcher(transport);

        let err = TableQuery::new("https://example.com/t/8", MATCH_ALL)
            .run_as::<_, ReportTextRow>(&fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse { attempts: 3, .. }));
        assert_eq!(fetcher.transport().request_count(), 3);
    }
}
