//! Named lookups against the report tables.

use super::fetcher::{Fetcher, Transport};
use super::table::{in_clause, query_table, MATCH_ALL};
use crate::config::TablesConfig;
use crate::error::QueryError;
use crate::models::{
    GroupTextRow, GroupingRow, HazardTextRow, OtherDataRow, ReportTextRow, UnitTextRow,
};

/// Sort order of the group text table; drives report section order.
pub const GROUP_ORDER: &str = "Order_ ASC";

/// Typed access to the report tables.
pub struct ReportTables<'a, T: Transport> {
    fetcher: &'a Fetcher<T>,
    tables: &'a TablesConfig,
}

impl<'a, T: Transport> ReportTables<'a, T> {
    pub fn new(fetcher: &'a Fetcher<T>, tables: &'a TablesConfig) -> Self {
        Self { fetcher, tables }
    }

    /// Group assignment of each hazard code.
    pub async fn groupings(&self, hazard_codes: &[String]) -> Result<Vec<GroupingRow>, QueryError> {
        query_table(
            self.fetcher,
            &self.tables.hazard_groupings,
            &in_clause("HazardCode", hazard_codes),
            &["HazardCode", "HazardGroup"],
            None,
        )
        .await
    }

    pub async fn intro_text(&self, hazard_codes: &[String]) -> Result<Vec<HazardTextRow>, QueryError> {
        query_table(
            self.fetcher,
            &self.tables.hazard_intro_text,
            &in_clause("Hazard", hazard_codes),
            &["Hazard", "Text"],
            None,
        )
        .await
    }

    pub async fn references(&self, hazard_codes: &[String]) -> Result<Vec<HazardTextRow>, QueryError> {
        query_table(
            self.fetcher,
            &self.tables.hazard_reference_text,
            &in_clause("Hazard", hazard_codes),
            &["Hazard", "Text"],
            None,
        )
        .await
    }

    /// Descriptions of the given unit codes.
    pub async fn unit_text(&self, unit_codes: &[String]) -> Result<Vec<UnitTextRow>, QueryError> {
        query_table(
            self.fetcher,
            &self.tables.hazard_unit_text,
            &in_clause("HazardUnit", unit_codes),
            &["HazardName", "HazardUnit", "HowToUse", "Description", "UnitName"],
            None,
        )
        .await
    }

    pub async fn report_text(&self) -> Result<Vec<ReportTextRow>, QueryError> {
        query_table(
            self.fetcher,
            &self.tables.report_text,
            MATCH_ALL,
            &["Section", "Text"],
            None,
        )
        .await
    }

    pub async fn other_data(&self) -> Result<Vec<OtherDataRow>, QueryError> {
        query_table(
            self.fetcher,
            &self.tables.other_data,
            MATCH_ALL,
            &["Data", "Introduction", "HowToUse", "References_"],
            None,
        )
        .await
    }

    /// Display text of the given groups, in report order.
    pub async fn group_text(&self, groups: &[String]) -> Result<Vec<GroupTextRow>, QueryError> {
        query_table(
            self.fetcher,
            &self.tables.hazard_group_text,
            &in_clause("HazardGroup", groups),
            &["HazardGroup", "Text"],
            Some(GROUP_ORDER),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fetcher::RetryPolicy;
    use crate::query::testing::{features, MockTransport};
    use serde_json::json;
    use std::time::Duration;

    fn fetcher(transport: MockTransport) -> Fetcher<MockTransport> {
        Fetcher::new(
            transport,
            RetryPolicy {
                max_attempts: 1,
                delay: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_group_text_is_ordered_and_filtered() {
        let tables = TablesConfig::default();
        let fetcher = fetcher(MockTransport::new().route(
            "/FeatureServer/1/query",
            features(vec![
                json!({ "HazardGroup": "Earthquake", "Text": "Shaking" }),
                json!({ "HazardGroup": "Flooding", "Text": "Water" }),
            ]),
        ));
        let lookups = ReportTables::new(&fetcher, &tables);

        let groups = vec!["Flooding".to_string(), "Earthquake".to_string()];
        let rows = lookups.group_text(&groups).await.unwrap();
        assert_eq!(rows[0].hazard_group.as_deref(), Some("Earthquake"));
        assert_eq!(rows[1].text.as_deref(), Some("Water"));

        let request = &fetcher.transport().requests()[0];
        assert!(request.contains("where=HazardGroup IN ('Flooding','Earthquake')"));
        assert!(request.contains("orderByFields=Order_ ASC"));
    }

    #[tokio::test]
    async fn test_unit_text_fields() {
        let tables = TablesConfig::default();
        let fetcher = fetcher(MockTransport::new());
        let lookups = ReportTables::new(&fetcher, &tables);

        let rows = lookups.unit_text(&["HflH".to_string()]).await.unwrap();
        assert!(rows.is_empty());

        let request = &fetcher.transport().requests()[0];
        assert!(request.contains("where=HazardUnit IN ('HflH')"));
        assert!(request.contains("outFields=HazardName,HazardUnit,HowToUse,Description,UnitName"));
    }

    #[tokio::test]
    async fn test_parameterless_lookups_match_all_rows() {
        let tables = TablesConfig::default();
        let fetcher = fetcher(MockTransport::new().route(
            "/FeatureServer/7/query",
            features(vec![json!({
                "Data": "Lidar Elevation Data",
                "Introduction": "intro",
                "HowToUse": null,
                "References_": "refs"
            })]),
        ));
        let lookups = ReportTables::new(&fetcher, &tables);

        let other = lookups.other_data().await.unwrap();
        assert_eq!(other[0].data.as_deref(), Some("Lidar Elevation Data"));
        assert_eq!(other[0].references.as_deref(), Some("refs"));

        lookups.report_text().await.unwrap();
        for request in fetcher.transport().requests() {
            assert!(request.contains("where=1=1"));
        }
    }

    #[tokio::test]
    async fn test_empty_code_list_sends_match_nothing_clause() {
        let tables = TablesConfig::default();
        let fetcher = fetcher(MockTransport::new());
        let lookups = ReportTables::new(&fetcher, &tables);

        let rows = lookups.groupings(&[]).await.unwrap();
        assert!(rows.is_empty());
        assert!(fetcher.transport().requests()[0].contains("where=1=0"));
    }
}
