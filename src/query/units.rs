//! Per-source AOI intersection queries.

use super::fetcher::{feature_attributes, Fetcher, Transport};
use super::table::query_endpoint;
use crate::error::QueryError;
use crate::models::{AreaOfInterest, HazardInfo, HazardSource};
use serde_json::Value;
use tracing::debug;

/// Resolve a source path: absolute URLs pass through, anything else is
/// joined onto `base_url`.
pub fn resolve_endpoint(base_url: &str, path: &str) -> String {
    if path.starts_with("https://") || path.starts_with("http://") {
        path.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Intersect one source with the AOI and list the unit codes found.
///
/// Null or non-string unit values are skipped. Duplicates are kept.
pub async fn query_units<T: Transport>(
    fetcher: &Fetcher<T>,
    base_url: &str,
    source: &HazardSource,
    aoi: &AreaOfInterest,
) -> Result<HazardInfo, QueryError> {
    let endpoint = resolve_endpoint(base_url, &source.path);
    let field = source.unit_field();

    let geometry = serde_json::to_string(&aoi.polygon).map_err(|e| QueryError::InvalidUrl {
        url: endpoint.clone(),
        reason: format!("cannot encode geometry: {}", e),
    })?;

    let url = query_endpoint(
        &endpoint,
        &[
            ("geometryType", "esriGeometryPolygon".to_string()),
            ("geometry", geometry),
            ("returnGeometry", "false".to_string()),
            ("outFields", field.clone()),
            ("f", "json".to_string()),
        ],
    )?;

    let units = fetcher
        .fetch_with(&url, |payload| {
            let records = feature_attributes(payload)?;
            Ok(records
                .iter()
                .filter_map(|record| record.get(&field).and_then(Value::as_str))
                .map(str::to_string)
                .collect::<Vec<String>>())
        })
        .await?;

    debug!("{}: {} unit(s) in AOI", source.hazard_code, units.len());

    Ok(HazardInfo {
        url: endpoint,
        hazard_code: source.hazard_code.clone(),
        units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Polygon, SpatialReference};
    use crate::query::fetcher::RetryPolicy;
    use crate::query::testing::{features, MockTransport};
    use serde_json::json;
    use std::time::Duration;

    const BASE: &str = "https://services.example.com/rest/services";

    fn aoi() -> AreaOfInterest {
        AreaOfInterest {
            description: "Test".to_string(),
            polygon: Polygon {
                rings: vec![vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 0.0]]],
                spatial_reference: SpatialReference { wkid: 26912 },
            },
        }
    }

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
    fn test_resolve_endpoint() {
        assert_eq!(
            resolve_endpoint(BASE, "Hazards/FeatureServer/0"),
            "https://services.example.com/rest/services/Hazards/FeatureServer/0"
        );
        assert_eq!(
            resolve_endpoint(&format!("{}/", BASE), "/Hazards/FeatureServer/0"),
            "https://services.example.com/rest/services/Hazards/FeatureServer/0"
        );
        assert_eq!(
            resolve_endpoint(BASE, "https://other.example.com/MapServer/0"),
            "https://other.example.com/MapServer/0"
        );
    }

    #[tokio::test]
    async fn test_query_units_maps_field_values() {
        let transport = MockTransport::new().route(
            "/Hazards/FeatureServer/0/query",
            features(vec![
                json!({ "FLHHazardUnit": "HflH" }),
                json!({ "FLHHazardUnit": "HflH" }),
                json!({ "FLHHazardUnit": null }),
                json!({ "FLHHazardUnit": "MflH" }),
            ]),
        );
        let fetcher = fetcher(transport);
        let source = HazardSource::new("Hazards/FeatureServer/0", "FLH");

        let info = query_units(&fetcher, BASE, &source, &aoi()).await.unwrap();
        assert_eq!(info.hazard_code, "FLH");
        assert_eq!(info.units, vec!["HflH", "HflH", "MflH"]);
        assert_eq!(
            info.url,
            "https://services.example.com/rest/services/Hazards/FeatureServer/0"
        );
    }

    #[tokio::test]
    async fn test_query_units_request_parameters() {
        let fetcher = fetcher(MockTransport::new());
        let source = HazardSource::new("Hazards/FeatureServer/3", "LSF");

        let info = query_units(&fetcher, BASE, &source, &aoi()).await.unwrap();
        assert!(!info.has_units());

        let requests = fetcher.transport().requests();
        assert_eq!(requests.len(), 1);
        let line = &requests[0];
        assert!(line.contains("geometryType=esriGeometryPolygon"));
        assert!(line.contains("returnGeometry=false"));
        assert!(line.contains("outFields=LSFHazardUnit"));
        assert!(line.contains("f=json"));
        assert!(line.contains(r#""spatialReference":{"wkid":26912}"#));
    }

    #[tokio::test]
    async fn test_query_units_propagates_failure() {
        let transport = MockTransport::new().fail("/Hazards/FeatureServer/1/query", 500);
        let fetcher = fetcher(transport);
        let source = HazardSource::new("Hazards/FeatureServer/1", "SGS");

        let err = query_units(&fetcher, BASE, &source, &aoi()).await.unwrap_err();
        assert!(err.url().contains("/Hazards/FeatureServer/1/query"));
        assert_eq!(fetcher.transport().request_count(), 3);
    }
}
