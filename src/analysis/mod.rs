//! Analysis modules.
//!
//! `aggregator` folds raw table rows into the report lookup maps;
//! `orchestrator` drives the queries that produce those rows.

pub mod aggregator;
pub mod orchestrator;

pub use orchestrator::Orchestrator;
