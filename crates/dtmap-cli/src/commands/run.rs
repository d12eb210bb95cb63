use dtmap_core::config::{OutputPaths, PipelineOptions, DEFAULT_MAPPINGS_FILE};
use dtmap_core::error::DtmapError;
use dtmap_core::pipeline::Pipeline;
use dtmap_core::profile::load_records;
use dtmap_core::terminology::FileTerminology;
use std::path::{Path, PathBuf};

use crate::output;

pub fn run(
    records_file: &Path,
    terminology_file: &Path,
    clusters_out: PathBuf,
    mappings_out: PathBuf,
    options: PipelineOptions,
    output_format: &str,
) -> Result<(), DtmapError> {
    // Fail on configuration and inputs before the first oracle call.
    options.validate()?;
    let oracle = super::oracle_from_env()?;
    let records = load_records(records_file)?;
    let source = FileTerminology::load(terminology_file)?;

    let paths = OutputPaths {
        cluster_map: clusters_out,
        mappings: mappings_out,
    };
    let summary = dtmap_core::map_conditions(&records, &source, &oracle, &options, &paths)?;

    match output_format {
        "json" => output::json::print(&summary)?,
        _ => output::table::print_summary(&summary, &paths),
    }
    Ok(())
}

pub fn cluster(
    terminology_file: &Path,
    clusters_out: PathBuf,
    options: PipelineOptions,
    output_format: &str,
) -> Result<(), DtmapError> {
    options.validate()?;
    let oracle = super::oracle_from_env()?;
    let source = FileTerminology::load(terminology_file)?;

    let paths = OutputPaths {
        cluster_map: clusters_out,
        mappings: PathBuf::from(DEFAULT_MAPPINGS_FILE),
    };
    let pipeline = Pipeline::new(&oracle, &source, options, paths);
    let (clusters, summary) = pipeline.cluster_terminology()?;

    match output_format {
        "json" => output::json::print(&clusters)?,
        _ => output::table::print_clusters(&clusters, &summary),
    }
    eprintln!(
        "{} cluster(s) written to {}",
        clusters.len(),
        pipeline.paths().cluster_map.display()
    );
    Ok(())
}

pub fn rematch(
    records_file: &Path,
    clusters_file: &Path,
    direct: bool,
    mappings_out: PathBuf,
    options: PipelineOptions,
    output_format: &str,
) -> Result<(), DtmapError> {
    options.validate()?;
    let oracle = super::oracle_from_env()?;
    let records = load_records(records_file)?;

    // Matching never fetches codes, so an empty table stands in for the source.
    let source = FileTerminology::from_codes("none", Vec::new());
    let paths = OutputPaths {
        cluster_map: clusters_file.to_path_buf(),
        mappings: mappings_out,
    };
    let pipeline = Pipeline::new(&oracle, &source, options, paths);
    let pass = if direct {
        pipeline.map_direct(&records)?
    } else {
        let clusters = dtmap_core::load_cluster_map(clusters_file)?;
        pipeline.match_records(&records, &clusters)?
    };

    match output_format {
        "json" => output::json::print(&pass.mappings)?,
        _ => {
            let rows: Vec<_> = pass.mappings.iter().collect();
            output::table::print_mappings(&rows);
            output::table::print_tiers(&pass.tiers);
        }
    }
    if pass.checkpoint_failures > 0 {
        eprintln!(
            "warning: {} checkpoint write(s) failed",
            pass.checkpoint_failures
        );
    }
    eprintln!(
        "{} record(s) written to {}",
        pass.mappings.len(),
        pipeline.paths().mappings.display()
    );
    Ok(())
}
