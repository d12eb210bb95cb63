pub mod checkpoint;
pub mod classify;
pub mod cluster;
pub mod config;
pub mod error;
pub mod matching;
pub mod model;
pub mod oracle;
pub mod parsing;
pub mod pipeline;
pub mod profile;
pub mod query;
pub mod terminology;
pub mod verify;

#[cfg(test)]
mod test_support;

use cluster::ClusterMap;
use config::{OutputPaths, PipelineOptions};
use error::DtmapError;
use oracle::Oracle;
use pipeline::{Pipeline, RunSummary};
use profile::DecisionTreeRecord;
use terminology::TerminologySource;

/// Main API entry point: cluster the terminology and map every record to a
/// cluster and a category, writing both output files.
pub fn map_conditions(
    records: &[DecisionTreeRecord],
    source: &dyn TerminologySource,
    oracle: &dyn Oracle,
    options: &PipelineOptions,
    paths: &OutputPaths,
) -> Result<RunSummary, DtmapError> {
    Pipeline::new(oracle, source, options.clone(), paths.clone()).run(records)
}

/// Load a cluster map written by an earlier run.
pub fn load_cluster_map(path: &std::path::Path) -> Result<ClusterMap, DtmapError> {
    checkpoint::read_json(path)
}

/// Load a mapping output written by an earlier run.
pub fn load_mappings(path: &std::path::Path) -> Result<Vec<model::MappingRecord>, DtmapError> {
    checkpoint::read_json(path)
}
