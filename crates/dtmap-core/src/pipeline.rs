//! Batch orchestration: cluster the terminology page by page and remap every
//! condition after each page, checkpointing as it goes.

use crate::checkpoint::{write_json_atomic, Checkpointer};
use crate::classify::CategoryClassifier;
use crate::cluster::{ClusterMap, ClusterSource, ClusteringEngine};
use crate::config::{OutputPaths, PipelineOptions};
use crate::error::DtmapError;
use crate::matching::{DirectMapper, GroupMatch, Matcher};
use crate::model::{ConditionProfile, MappingRecord, MatchTier};
use crate::oracle::{Oracle, Throttle};
use crate::profile::{extract_profile, DecisionTreeRecord};
use crate::terminology::TerminologySource;
use serde::Serialize;
use std::fmt;

/// Where the orchestrator is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    ClusteringBatch(usize),
    MatchingRecords(usize),
    CheckpointWrite(usize),
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Init => write!(f, "init"),
            RunState::ClusteringBatch(i) => write!(f, "clustering batch {i}"),
            RunState::MatchingRecords(i) => write!(f, "matching records after batch {i}"),
            RunState::CheckpointWrite(i) => write!(f, "writing checkpoint for batch {i}"),
            RunState::Done => write!(f, "done"),
        }
    }
}

/// How many records each tier resolved in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub substring: usize,
    pub fuzzy: usize,
    pub oracle: usize,
    pub direct: usize,
    pub none: usize,
}

impl TierCounts {
    fn count(&mut self, tier: MatchTier) {
        match tier {
            MatchTier::Substring => self.substring += 1,
            MatchTier::Fuzzy => self.fuzzy += 1,
            MatchTier::Oracle => self.oracle += 1,
            MatchTier::Direct => self.direct += 1,
            MatchTier::None => self.none += 1,
        }
    }
}

/// One matching pass over all records.
#[derive(Debug, Clone, Default)]
pub struct MatchPass {
    pub mappings: Vec<MappingRecord>,
    pub tiers: TierCounts,
    pub checkpoint_failures: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Terminology pages clustered.
    pub batches: usize,
    /// Codes fetched across all pages.
    pub codes: usize,
    /// Pages whose clustering fell back to one cluster per code.
    pub fallback_batches: usize,
    /// Clusters in the final map.
    pub clusters: usize,
    /// Records in the final mapping output.
    pub records: usize,
    /// Matching passes over the records.
    pub passes: usize,
    /// Tier counts of the final pass.
    pub tiers: TierCounts,
    pub checkpoint_failures: usize,
}

/// Drives clustering, matching, classification and checkpointing.
pub struct Pipeline<'a> {
    oracle: &'a dyn Oracle,
    source: &'a dyn TerminologySource,
    options: PipelineOptions,
    paths: OutputPaths,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        source: &'a dyn TerminologySource,
        options: PipelineOptions,
        paths: OutputPaths,
    ) -> Self {
        Self {
            oracle,
            source,
            options,
            paths,
        }
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    /// Run the whole pipeline over `records`.
    ///
    /// After every terminology page the cluster map is persisted and all
    /// records are remapped against the grown map, so the mapping file always
    /// reflects the latest clusters. Terminology errors abort the run;
    /// checkpoint failures are logged and counted.
    pub fn run(&self, records: &[DecisionTreeRecord]) -> Result<RunSummary, DtmapError> {
        self.options.validate()?;

        let engine = ClusteringEngine::new(
            self.oracle,
            self.options.retry_attempts,
            self.options.retry_delay,
        );
        let batch_pause = Throttle::new(self.options.batch_delay);

        let mut summary = RunSummary::default();
        let mut clusters = ClusterMap::new();
        let mut mappings: Vec<MappingRecord> = Vec::new();
        let mut offset = 0;
        let mut exhausted = false;
        let mut state = RunState::Init;

        tracing::info!(
            source = self.source.source_name(),
            oracle = self.oracle.backend_name(),
            records = records.len(),
            batch_size = self.options.batch_size,
            "Starting pipeline"
        );

        loop {
            let next = match state {
                RunState::Init => RunState::ClusteringBatch(0),

                RunState::ClusteringBatch(i) => {
                    let page =
                        self.source
                            .fetch(&self.options.code_filter, offset, self.options.batch_size)?;

                    if page.is_empty() {
                        if i == 0 {
                            tracing::warn!("Terminology source returned no codes");
                            exhausted = true;
                            self.persist_clusters(&clusters, &mut summary);
                            RunState::MatchingRecords(i)
                        } else {
                            RunState::Done
                        }
                    } else {
                        offset += page.len();
                        exhausted = page.len() < self.options.batch_size;
                        summary.batches += 1;
                        summary.codes += page.len();

                        tracing::info!(batch = i, codes = page.len(), offset, "Clustering batch");
                        let outcome = engine.cluster_all(&page, &mut clusters);
                        if outcome.source == ClusterSource::Fallback {
                            summary.fallback_batches += 1;
                        }
                        self.persist_clusters(&clusters, &mut summary);
                        RunState::MatchingRecords(i)
                    }
                }

                RunState::MatchingRecords(i) => {
                    let pass = self.match_pass(records, &clusters, &mappings);
                    summary.passes += 1;
                    summary.tiers = pass.tiers;
                    summary.checkpoint_failures += pass.checkpoint_failures;
                    mappings = pass.mappings;
                    RunState::CheckpointWrite(i)
                }

                RunState::CheckpointWrite(i) => {
                    if let Err(e) = write_json_atomic(&self.paths.mappings, &mappings) {
                        tracing::error!(error = %e, "Failed to write mapping output");
                        summary.checkpoint_failures += 1;
                    } else {
                        tracing::info!(
                            batch = i,
                            records = mappings.len(),
                            path = %self.paths.mappings.display(),
                            "Mapping output written"
                        );
                    }

                    if exhausted {
                        RunState::Done
                    } else {
                        batch_pause.pause();
                        RunState::ClusteringBatch(i + 1)
                    }
                }

                RunState::Done => break,
            };

            tracing::debug!(from = %state, to = %next, "State transition");
            state = next;
        }

        summary.clusters = clusters.len();
        summary.records = mappings.len();
        tracing::info!(
            batches = summary.batches,
            codes = summary.codes,
            clusters = summary.clusters,
            records = summary.records,
            checkpoint_failures = summary.checkpoint_failures,
            "Pipeline finished"
        );
        Ok(summary)
    }

    /// Cluster the whole terminology without matching any records.
    ///
    /// The cluster map file is rewritten after every page.
    pub fn cluster_terminology(&self) -> Result<(ClusterMap, RunSummary), DtmapError> {
        self.options.validate()?;

        let engine = ClusteringEngine::new(
            self.oracle,
            self.options.retry_attempts,
            self.options.retry_delay,
        );
        let batch_pause = Throttle::new(self.options.batch_delay);
        let mut summary = RunSummary::default();
        let mut clusters = ClusterMap::new();
        let mut offset = 0;

        loop {
            let page = self
                .source
                .fetch(&self.options.code_filter, offset, self.options.batch_size)?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            summary.batches += 1;
            summary.codes += page.len();

            tracing::info!(batch = summary.batches - 1, codes = page.len(), offset, "Clustering batch");
            if engine.cluster_all(&page, &mut clusters).source == ClusterSource::Fallback {
                summary.fallback_batches += 1;
            }
            self.persist_clusters(&clusters, &mut summary);

            if page.len() < self.options.batch_size {
                break;
            }
            batch_pause.pause();
        }

        if summary.batches == 0 {
            tracing::warn!("Terminology source returned no codes");
            self.persist_clusters(&clusters, &mut summary);
        }
        summary.clusters = clusters.len();
        Ok((clusters, summary))
    }

    /// Map every record against a fixed cluster map, checkpointing as it goes.
    ///
    /// The complete list is written to the mapping file at the end of the pass.
    pub fn match_records(
        &self,
        records: &[DecisionTreeRecord],
        clusters: &ClusterMap,
    ) -> Result<MatchPass, DtmapError> {
        self.options.validate()?;
        let mut pass = self.match_pass(records, clusters, &[]);
        if let Err(e) = write_json_atomic(&self.paths.mappings, &pass.mappings) {
            tracing::error!(error = %e, "Failed to write mapping output");
            pass.checkpoint_failures += 1;
        }
        Ok(pass)
    }

    /// Map every record with the oracle alone, skipping clustering.
    ///
    /// Each condition is named and coded straight from its profile. The
    /// complete list is written to the mapping file at the end of the pass.
    pub fn map_direct(&self, records: &[DecisionTreeRecord]) -> Result<MatchPass, DtmapError> {
        self.options.validate()?;
        tracing::info!(
            oracle = self.oracle.backend_name(),
            records = records.len(),
            "Mapping conditions directly"
        );
        let mapper = DirectMapper::new(self.oracle, Throttle::new(self.options.call_delay));
        let mut pass = self.resolve_pass(records, &[], |profile| mapper.map(profile));
        if let Err(e) = write_json_atomic(&self.paths.mappings, &pass.mappings) {
            tracing::error!(error = %e, "Failed to write mapping output");
            pass.checkpoint_failures += 1;
        }
        Ok(pass)
    }

    /// One inner-loop pass through the matching cascade.
    fn match_pass(
        &self,
        records: &[DecisionTreeRecord],
        clusters: &ClusterMap,
        previous: &[MappingRecord],
    ) -> MatchPass {
        let matcher = Matcher::standard(self.oracle, &self.options);
        self.resolve_pass(records, previous, |profile| {
            matcher.resolve(&profile.condition_name, clusters)
        })
    }

    /// Resolve and classify every record in order. Mid-pass flushes keep the
    /// tail of `previous` so that each checkpoint covers at least as many
    /// records as the last one.
    fn resolve_pass<F>(
        &self,
        records: &[DecisionTreeRecord],
        previous: &[MappingRecord],
        resolve: F,
    ) -> MatchPass
    where
        F: Fn(&ConditionProfile) -> GroupMatch,
    {
        let classifier = CategoryClassifier::new(self.oracle, Throttle::new(self.options.call_delay));
        let flush_pause = Throttle::new(self.options.flush_delay);
        let mut checkpointer: Checkpointer<MappingRecord> =
            Checkpointer::new(&self.paths.mappings, self.options.flush_every);

        let mut pass = MatchPass {
            mappings: Vec::with_capacity(records.len()),
            ..MatchPass::default()
        };

        for record in records {
            let profile = extract_profile(record);
            let group = resolve(&profile);
            let category = classifier.classify(&profile);
            pass.tiers.count(group.tier);

            pass.mappings.push(MappingRecord {
                condition_name: profile.condition_name.clone(),
                matched_representative: group.representative,
                matched_codes: group.codes,
                match_tier: group.tier,
                category,
                profile,
            });

            match checkpointer.record(&pass.mappings, previous) {
                Ok(false) => continue,
                Ok(true) => tracing::info!(
                    processed = pass.mappings.len(),
                    total = records.len(),
                    "Checkpoint flushed"
                ),
                Err(e) => {
                    tracing::error!(error = %e, "Checkpoint flush failed");
                    pass.checkpoint_failures += 1;
                }
            }
            flush_pause.pause();
        }

        pass
    }

    fn persist_clusters(&self, clusters: &ClusterMap, summary: &mut RunSummary) {
        match write_json_atomic(&self.paths.cluster_map, clusters) {
            Ok(()) => tracing::info!(
                clusters = clusters.len(),
                path = %self.paths.cluster_map.display(),
                "Cluster map written"
            ),
            Err(e) => {
                tracing::error!(error = %e, "Failed to write cluster map");
                summary.checkpoint_failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::read_json;
    use crate::model::{Category, TerminologyCode, NO_SUITABLE_GROUP};
    use crate::oracle::Prompt;
    use crate::profile::{Triple, TreeNode};
    use crate::terminology::FileTerminology;
    use crate::test_support::{down_oracle, FnOracle};

    fn record(name: &str) -> DecisionTreeRecord {
        DecisionTreeRecord {
            text: format!("{name}@..."),
            tree: vec![TreeNode {
                role: "C".into(),
                triples: vec![Triple("患者".into(), "临床表现".into(), "发热".into())],
                logical_rel: None,
            }],
        }
    }

    fn paths(dir: &tempfile::TempDir) -> OutputPaths {
        OutputPaths {
            cluster_map: dir.path().join("clusters.json"),
            mappings: dir.path().join("mappings.json"),
        }
    }

    fn options(batch_size: usize) -> PipelineOptions {
        PipelineOptions {
            batch_size,
            ..PipelineOptions::without_delays()
        }
    }

    #[test]
    fn test_empty_source_writes_sentinel_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = down_oracle();
        let source = FileTerminology::from_codes("empty", vec![]);
        let pipeline = Pipeline::new(&oracle, &source, options(50), paths(&dir));

        let summary = pipeline.run(&[record("发热"), record("咳嗽")]).unwrap();
        assert_eq!(summary.batches, 0);
        assert_eq!(summary.passes, 1);
        assert_eq!(summary.tiers.none, 2);

        let out: Vec<MappingRecord> = read_json(&pipeline.paths().mappings).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.matched_representative == NO_SUITABLE_GROUP));
        assert!(out.iter().all(|r| r.category == Category::Other));
        let clusters: ClusterMap = read_json(&pipeline.paths().cluster_map).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_one_pass_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = down_oracle();
        let codes = (0..5)
            .map(|i| TerminologyCode::new(format!("00{i}"), format!("Code {i}")))
            .collect();
        let source = FileTerminology::from_codes("five", codes);
        let pipeline = Pipeline::new(&oracle, &source, options(2), paths(&dir));

        let summary = pipeline.run(&[record("Code 4")]).unwrap();
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.passes, 3);
        assert_eq!(summary.fallback_batches, 3);
        assert_eq!(summary.clusters, 5);
        assert_eq!(summary.tiers.substring, 1);
    }

    #[test]
    fn test_exact_multiple_of_batch_size_ends_on_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = down_oracle();
        let codes = (0..4)
            .map(|i| TerminologyCode::new(format!("00{i}"), format!("Code {i}")))
            .collect();
        let source = FileTerminology::from_codes("four", codes);
        let pipeline = Pipeline::new(&oracle, &source, options(2), paths(&dir));

        let summary = pipeline.run(&[record("Code 0")]).unwrap();
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.codes, 4);
    }

    #[test]
    fn test_cluster_terminology_only() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = down_oracle();
        let codes = (0..3)
            .map(|i| TerminologyCode::new(format!("00{i}"), format!("Code {i}")))
            .collect();
        let source = FileTerminology::from_codes("three", codes);
        let pipeline = Pipeline::new(&oracle, &source, options(2), paths(&dir));

        let (clusters, summary) = pipeline.cluster_terminology().unwrap();
        assert_eq!(summary.batches, 2);
        assert_eq!(clusters.len(), 3);
        assert_eq!(summary.passes, 0);
        let on_disk: ClusterMap = read_json(&pipeline.paths().cluster_map).unwrap();
        assert_eq!(on_disk, clusters);
        assert!(!pipeline.paths().mappings.exists());
    }

    #[test]
    fn test_mid_pass_flush_keeps_previous_tail() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = down_oracle();
        let source = FileTerminology::from_codes("empty", vec![]);
        let options = PipelineOptions {
            flush_every: 2,
            ..PipelineOptions::without_delays()
        };
        let pipeline = Pipeline::new(&oracle, &source, options, paths(&dir));

        let previous: Vec<MappingRecord> = (0..5)
            .map(|i| MappingRecord {
                condition_name: format!("old {i}"),
                matched_representative: NO_SUITABLE_GROUP.into(),
                matched_codes: vec![],
                match_tier: MatchTier::None,
                category: Category::Other,
                profile: Default::default(),
            })
            .collect();
        let records: Vec<DecisionTreeRecord> = (0..3).map(|i| record(&format!("new {i}"))).collect();

        pipeline.match_pass(&records[..2], &ClusterMap::new(), &previous);
        let on_disk: Vec<MappingRecord> = read_json(&pipeline.paths().mappings).unwrap();
        let names: Vec<&str> = on_disk.iter().map(|r| r.condition_name.as_str()).collect();
        assert_eq!(names, vec!["new 0", "new 1", "old 2", "old 3", "old 4"]);
    }

    #[test]
    fn test_terminology_error_aborts() {
        struct Broken;
        impl TerminologySource for Broken {
            fn fetch(
                &self,
                _filter: &crate::terminology::CodeFilter,
                _offset: usize,
                _limit: usize,
            ) -> Result<Vec<TerminologyCode>, DtmapError> {
                Err(DtmapError::Terminology("database unavailable".into()))
            }

            fn lookup(&self, _codes: &[String]) -> Result<Vec<TerminologyCode>, DtmapError> {
                Ok(vec![])
            }

            fn source_name(&self) -> &str {
                "broken"
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let oracle = down_oracle();
        let pipeline = Pipeline::new(&oracle, &Broken, options(50), paths(&dir));
        let err = pipeline.run(&[record("发热")]).unwrap_err();
        assert!(matches!(err, DtmapError::Terminology(_)));
        assert!(!pipeline.paths().mappings.exists());
    }

    #[test]
    fn test_unwritable_output_is_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let paths = OutputPaths {
            cluster_map: blocker.join("clusters.json"),
            mappings: blocker.join("mappings.json"),
        };

        let oracle = FnOracle(|_: &Prompt| -> Result<String, DtmapError> {
            Ok(r#"{"category": "respiratory"}"#.to_string())
        });
        let source = FileTerminology::from_codes("empty", vec![]);
        let pipeline = Pipeline::new(&oracle, &source, options(50), paths);

        let summary = pipeline.run(&[record("咳嗽")]).unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(summary.checkpoint_failures, 2);
    }

    #[test]
    fn test_map_direct_skips_clustering() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = FnOracle(|p: &Prompt| -> Result<String, DtmapError> {
            if p.user.starts_with("I have a decision-tree condition") {
                if p.user.contains("咳嗽") {
                    Ok("not json".to_string())
                } else {
                    Ok(r#"{"mimic_condition": "Fever", "icd9_codes": ["780.6"]}"#.to_string())
                }
            } else {
                Ok(r#"{"category": "respiratory"}"#.to_string())
            }
        });
        let source = FileTerminology::from_codes("empty", vec![]);
        let pipeline = Pipeline::new(&oracle, &source, options(50), paths(&dir));

        let pass = pipeline.map_direct(&[record("发热"), record("咳嗽")]).unwrap();
        assert_eq!(pass.tiers.direct, 1);
        assert_eq!(pass.tiers.none, 1);

        let out: Vec<MappingRecord> = read_json(&pipeline.paths().mappings).unwrap();
        assert_eq!(out[0].matched_representative, "Fever");
        assert_eq!(out[0].matched_codes, vec!["780.6"]);
        assert_eq!(out[0].match_tier, MatchTier::Direct);
        assert_eq!(out[0].category, Category::Respiratory);
        assert_eq!(out[1].matched_representative, NO_SUITABLE_GROUP);
        assert!(!pipeline.paths().cluster_map.exists());
    }

    #[test]
    fn test_invalid_options_rejected_before_work() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = down_oracle();
        let source = FileTerminology::from_codes("empty", vec![]);
        let pipeline = Pipeline::new(&oracle, &source, options(0), paths(&dir));
        assert!(matches!(
            pipeline.run(&[record("x")]),
            Err(DtmapError::Config(_))
        ));
    }
}
