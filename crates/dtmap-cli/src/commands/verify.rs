use dtmap_core::checkpoint::write_json_atomic;
use dtmap_core::config::PipelineOptions;
use dtmap_core::error::DtmapError;
use dtmap_core::terminology::FileTerminology;
use dtmap_core::verify::Verifier;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

use crate::output;

pub fn run(
    terminology_file: &Path,
    mappings_file: &Path,
    out: &Path,
    back_translate: bool,
    seed: Option<u64>,
    options: &PipelineOptions,
    output_format: &str,
) -> Result<(), DtmapError> {
    let oracle = super::oracle_from_env()?;
    let source = FileTerminology::load(terminology_file)?;
    let mappings = dtmap_core::load_mappings(mappings_file)?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let verifier = Verifier::new(&oracle, &source, options);
    let report = verifier.verify_sample(&mappings, &mut rng, back_translate)?;
    write_json_atomic(out, &report)?;

    match output_format {
        "json" => output::json::print(&report)?,
        _ => output::table::print_report(&report),
    }
    eprintln!("Verification written to {}", out.display());
    Ok(())
}
