use dtmap_core::cluster::ClusterMap;
use dtmap_core::config::OutputPaths;
use dtmap_core::model::{Category, ConditionProfile, MappingRecord, VerificationReport};
use dtmap_core::pipeline::{RunSummary, TierCounts};

pub fn print_summary(summary: &RunSummary, paths: &OutputPaths) {
    println!("=== Pipeline run ===\n");
    println!(
        "  Terminology: {} code(s) in {} batch(es)",
        summary.codes, summary.batches
    );
    if summary.fallback_batches > 0 {
        println!(
            "  Fallback:    {} batch(es) clustered one code per cluster",
            summary.fallback_batches
        );
    }
    println!("  Clusters:    {}", summary.clusters);
    println!(
        "  Records:     {} mapped ({} matching pass(es))",
        summary.records, summary.passes
    );
    println!();
    print_tiers(&summary.tiers);

    if summary.checkpoint_failures > 0 {
        println!(
            "  Checkpoint write failures: {} (see log)\n",
            summary.checkpoint_failures
        );
    }
    println!("  Cluster map: {}", paths.cluster_map.display());
    println!("  Mappings:    {}", paths.mappings.display());
}

pub fn print_tiers(tiers: &TierCounts) {
    println!("  Matched by:");
    println!("    substring  {}", tiers.substring);
    println!("    fuzzy      {}", tiers.fuzzy);
    println!("    oracle     {}", tiers.oracle);
    if tiers.direct > 0 {
        println!("    direct     {}", tiers.direct);
    }
    if tiers.none > 0 {
        println!("    unmatched  {}", tiers.none);
    }
    println!();
}

pub fn print_clusters(clusters: &ClusterMap, summary: &RunSummary) {
    println!(
        "=== {} cluster(s) from {} code(s) ===\n",
        clusters.len(),
        summary.codes
    );
    for (representative, codes) in clusters.iter() {
        println!("  {}", representative);
        println!("    {}", codes.join(", "));
    }
    if summary.fallback_batches > 0 {
        println!(
            "\n  {} batch(es) fell back to one cluster per code",
            summary.fallback_batches
        );
    }
}

pub fn print_mappings(records: &[&MappingRecord]) {
    if records.is_empty() {
        println!("No matching records.");
        return;
    }

    let max_name = records
        .iter()
        .map(|r| r.condition_name.chars().count())
        .max()
        .unwrap_or(10);

    for r in records {
        println!(
            "  {:<width$}  -> {} [{}] ({}, {})",
            r.condition_name,
            r.matched_representative,
            r.matched_codes.join(", "),
            r.category,
            r.match_tier,
            width = max_name
        );
    }
    println!();
}

pub fn print_profiles(profiles: &[ConditionProfile]) {
    for (i, profile) in profiles.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", profile.condition_name);
        if profile.questions.is_empty() {
            println!("  (no criterion questions)");
        }
        for question in &profile.questions {
            println!("  - {}", question);
        }
    }
}

pub fn print_report(report: &VerificationReport) {
    println!("=== Verification: {} ===\n", report.condition_name);
    println!("  Group:   {}", report.representative);
    if let Some(ref back) = report.back_translation {
        println!("           ({})", back);
    }
    println!("  Codes:");
    for detail in &report.code_details {
        println!("    {:<8} {}", detail.code, detail.description);
    }
    let missing: Vec<&str> = report
        .codes
        .iter()
        .filter(|c| !report.code_details.iter().any(|d| &d.code == *c))
        .map(|c| c.as_str())
        .collect();
    if !missing.is_empty() {
        println!("    not in terminology: {}", missing.join(", "));
    }
    if !report.questions.is_empty() {
        println!("  Profile:");
        for question in &report.questions {
            println!("    - {}", question);
        }
    }
    println!();
    println!("  {}\n", report.judgment);
    println!("  Verdict: {}", report.verdict);
}

pub fn print_counts(counts: &[(Category, usize)]) {
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    println!("=== {} mapped condition(s) ===\n", total);
    for (category, n) in counts {
        println!("  {:<18} {}", category.label(), n);
    }
}
