use dtmap_core::error::DtmapError;
use dtmap_core::model::Category;
use dtmap_core::query;
use std::path::Path;

use crate::output;

pub fn run(
    mappings_file: &Path,
    category: Option<&str>,
    code: Option<&str>,
    output_format: &str,
) -> Result<(), DtmapError> {
    let mappings = dtmap_core::load_mappings(mappings_file)?;

    let rows = match (category, code) {
        (Some(label), _) => query::by_category(&mappings, query::parse_category(label)?),
        (None, Some(code)) => query::by_code(&mappings, code),
        (None, None) => {
            let counts = query::category_counts(&mappings);
            match output_format {
                "json" => {
                    let by_label: Vec<_> = counts
                        .iter()
                        .map(|(cat, n)| serde_json::json!({ "category": cat, "count": n }))
                        .collect();
                    output::json::print(&by_label)?
                }
                _ => output::table::print_counts(&counts),
            }
            return Ok(());
        }
    };

    match output_format {
        "json" => output::json::print(&rows)?,
        _ => output::table::print_mappings(&rows),
    }
    Ok(())
}

pub fn categories() -> Result<(), DtmapError> {
    println!("Clinical categories:\n");
    for cat in Category::ALL {
        println!("  {}", cat);
    }
    Ok(())
}
