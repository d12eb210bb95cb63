use dtmap_core::error::DtmapError;
use dtmap_core::model::ConditionProfile;
use dtmap_core::profile::{extract_profile, load_records};
use std::path::Path;

use crate::output;

pub fn run(records_file: &Path, output_format: &str) -> Result<(), DtmapError> {
    let records = load_records(records_file)?;
    let profiles: Vec<ConditionProfile> = records.iter().map(extract_profile).collect();

    match output_format {
        "json" => output::json::print(&profiles)?,
        _ => output::table::print_profiles(&profiles),
    }
    Ok(())
}
