use super::map::ClusterMap;
use crate::error::DtmapError;
use crate::model::TerminologyCode;
use crate::oracle::{prompts, Oracle, Prompt};
use crate::parsing::parse_oracle_json;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// How the clusters of a batch were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterSource {
    /// The oracle returned at least one usable cluster.
    Oracle,
    /// Every attempt failed; each code became its own cluster.
    Fallback,
    /// Nothing to cluster.
    Empty,
}

/// Result of clustering one batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub source: ClusterSource,
    /// Clusters merged into the map from the oracle reply.
    pub accepted_clusters: usize,
    /// Codes of the batch that no accepted cluster claimed.
    pub remaining: Vec<TerminologyCode>,
}

#[derive(Debug, Deserialize)]
struct ClusterReply {
    #[serde(default)]
    clusters: Vec<ProposedCluster>,
}

#[derive(Debug, Deserialize)]
struct ProposedCluster {
    #[serde(default)]
    representative: Option<String>,
    #[serde(default)]
    codes: Vec<String>,
}

/// Groups terminology codes into clusters of equivalent codes with the oracle.
pub struct ClusteringEngine<'a> {
    oracle: &'a dyn Oracle,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl<'a> ClusteringEngine<'a> {
    pub fn new(oracle: &'a dyn Oracle, retry_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            oracle,
            retry_attempts: retry_attempts.max(1),
            retry_delay,
        }
    }

    /// Cluster one batch and merge the accepted clusters into `map`.
    ///
    /// Transport failures, unparsable replies and empty cluster lists are
    /// retried. When every attempt fails, each code in the batch is added as a
    /// singleton and nothing remains. Otherwise the codes no accepted cluster
    /// mentions are returned in `remaining` and are not added to `map`.
    pub fn cluster_batch(&self, batch: &[TerminologyCode], map: &mut ClusterMap) -> BatchOutcome {
        if batch.is_empty() {
            return BatchOutcome {
                source: ClusterSource::Empty,
                accepted_clusters: 0,
                remaining: Vec::new(),
            };
        }

        let Some(proposed) = self.request_with_retry(batch) else {
            tracing::warn!(
                codes = batch.len(),
                "No clusters from oracle after retries; using one cluster per code"
            );
            for code in batch {
                map.add_singleton(code);
            }
            return BatchOutcome {
                source: ClusterSource::Fallback,
                accepted_clusters: 0,
                remaining: Vec::new(),
            };
        };

        let batch_codes: HashSet<&str> = batch.iter().map(|c| c.code.as_str()).collect();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut accepted = 0;

        for cluster in proposed {
            let Some(representative) = cluster
                .representative
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
            else {
                continue;
            };

            let codes: Vec<String> = cluster
                .codes
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| batch_codes.contains(c.as_str()))
                .filter(|c| claimed.insert(c.clone()))
                .collect();

            if codes.is_empty() {
                tracing::debug!(representative, "Dropping cluster with no codes from this batch");
                continue;
            }

            map.merge_cluster(representative, codes);
            accepted += 1;
        }

        let remaining: Vec<TerminologyCode> = batch
            .iter()
            .filter(|c| !claimed.contains(&c.code))
            .cloned()
            .collect();

        tracing::info!(
            grouped = batch.len() - remaining.len(),
            remaining = remaining.len(),
            clusters = accepted,
            "Clustered batch"
        );

        BatchOutcome {
            source: ClusterSource::Oracle,
            accepted_clusters: accepted,
            remaining,
        }
    }

    /// Cluster one batch, then add every unclaimed code as a singleton.
    ///
    /// After this call every code in `batch` is a member of some cluster.
    pub fn cluster_all(&self, batch: &[TerminologyCode], map: &mut ClusterMap) -> BatchOutcome {
        let outcome = self.cluster_batch(batch, map);
        for code in &outcome.remaining {
            map.add_singleton(code);
        }
        outcome
    }

    fn request_with_retry(&self, batch: &[TerminologyCode]) -> Option<Vec<ProposedCluster>> {
        let prompt = prompts::clustering(batch);

        for attempt in 1..=self.retry_attempts {
            match self.request_clusters(&prompt) {
                Ok(clusters) if !clusters.is_empty() => return Some(clusters),
                Ok(_) => {
                    tracing::warn!(attempt, "Oracle returned no clusters");
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Clustering attempt failed");
                }
            }
            if attempt < self.retry_attempts && !self.retry_delay.is_zero() {
                std::thread::sleep(self.retry_delay);
            }
        }

        None
    }

    fn request_clusters(&self, prompt: &Prompt) -> Result<Vec<ProposedCluster>, DtmapError> {
        let reply = self.oracle.classify(prompt)?;
        tracing::debug!(reply = %reply, "Clustering reply");
        let parsed: ClusterReply = parse_oracle_json(&reply)?;
        Ok(parsed.clusters)
    }
}
