//! Aggregation orchestration.
//!
//! Runs every source query concurrently, derives the hazard codes found
//! in the AOI, then runs the dependent table lookups concurrently, and
//! finally the group text query that depends on the grouping result.
//! All futures are polled on the caller's task; there is no spawning,
//! no cancellation, and any failure aborts the run.

use super::aggregator::{
    build_report_data, distinct_groups, distinct_hazard_codes, distinct_unit_codes, LookupRows,
};
use crate::config::TablesConfig;
use crate::error::{QueryError, ReportError};
use crate::models::{AreaOfInterest, HazardInfo, HazardSource, ReportData};
use crate::progress::ProgressTracker;
use crate::query::lookups::ReportTables;
use crate::query::{query_units, Fetcher, Transport};
use futures::future::try_join_all;
use std::future::Future;
use tracing::{debug, info};

/// Progress id covering the dependent table lookups.
pub const RELATED_TABLES_TASK: &str = "related tables";

/// Join every task; fail with the first error.
pub async fn all_or_fail<I, F, R>(stage: &str, tasks: I) -> Result<Vec<R>, QueryError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<R, QueryError>>,
{
    let results = try_join_all(tasks).await?;
    debug!("Barrier '{}' passed with {} result(s)", stage, results.len());
    Ok(results)
}

/// Drives one report generation.
pub struct Orchestrator<'a, T: Transport> {
    fetcher: &'a Fetcher<T>,
    base_url: &'a str,
    tables: &'a TablesConfig,
}

impl<'a, T: Transport> Orchestrator<'a, T> {
    pub fn new(fetcher: &'a Fetcher<T>, base_url: &'a str, tables: &'a TablesConfig) -> Self {
        Self {
            fetcher,
            base_url,
            tables,
        }
    }

    /// Build the lookup bundle for `aoi`.
    pub async fn run(
        &self,
        sources: &[HazardSource],
        aoi: &AreaOfInterest,
        progress: &ProgressTracker,
    ) -> Result<ReportData, ReportError> {
        info!(
            "Generating report data for '{}' from {} source(s)",
            aoi.description,
            sources.len()
        );

        progress.register(RELATED_TABLES_TASK)?;
        for source in sources {
            progress.register(source.progress_id())?;
        }

        // First barrier: every source intersected with the AOI.
        let infos = self.query_sources(sources, aoi, progress).await?;

        let sources_with_results: Vec<HazardSource> = sources
            .iter()
            .zip(&infos)
            .filter(|(_, info)| info.has_units())
            .map(|(source, _)| source.clone())
            .collect();
        let unit_codes = distinct_unit_codes(&infos);
        let hazard_codes = distinct_hazard_codes(&unit_codes);
        info!(
            "{} of {} source(s) intersect the AOI: {} unit(s), hazards [{}]",
            sources_with_results.len(),
            sources.len(),
            unit_codes.len(),
            hazard_codes.join(", ")
        );

        // Second barrier: the lookups keyed by the codes found.
        let tables = ReportTables::new(self.fetcher, self.tables);
        let (groupings, intro_text, unit_text, references, report_text, other_data) = tokio::try_join!(
            tables.groupings(&hazard_codes),
            tables.intro_text(&hazard_codes),
            tables.unit_text(&unit_codes),
            tables.references(&hazard_codes),
            tables.report_text(),
            tables.other_data()
        )?;
        progress.complete(RELATED_TABLES_TASK);

        let groups = distinct_groups(&groupings);
        debug!("Hazard groups present: {:?}", groups);
        let group_text = tables.group_text(&groups).await?;

        Ok(build_report_data(LookupRows {
            groupings,
            group_text,
            intro_text,
            unit_text,
            references,
            report_text,
            other_data,
            sources_with_results,
        }))
    }

    /// Query every source concurrently, in source order.
    pub async fn query_sources(
        &self,
        sources: &[HazardSource],
        aoi: &AreaOfInterest,
        progress: &ProgressTracker,
    ) -> Result<Vec<HazardInfo>, QueryError> {
        all_or_fail(
            "hazard units",
            sources.iter().map(|source| async move {
                let info = query_units(self.fetcher, self.base_url, source, aoi).await?;
                progress.complete(&source.progress_id());
                Ok::<_, QueryError>(info)
            }),
        )
        .await
    }
}
