//! Resolves a condition to one cluster through an ordered cascade of tiers.

pub mod assisted;
pub mod direct;
pub mod fuzzy;
pub mod substring;

use crate::cluster::ClusterMap;
use crate::config::PipelineOptions;
use crate::model::{MatchTier, NO_SUITABLE_GROUP};
use crate::oracle::{Oracle, Throttle};
use serde::{Deserialize, Serialize};

pub use assisted::OracleTier;
pub use direct::DirectMapper;
pub use fuzzy::FuzzyTier;
pub use substring::SubstringTier;

/// One strategy in the matching cascade.
pub trait MatchStrategy {
    fn tier(&self) -> MatchTier;

    /// Return the representative of the matching cluster, if this tier finds one.
    fn try_match(&self, condition: &str, clusters: &ClusterMap) -> Option<String>;
}

/// The cluster a condition resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMatch {
    pub representative: String,
    pub codes: Vec<String>,
    pub tier: MatchTier,
}

impl GroupMatch {
    pub fn no_suitable_group() -> Self {
        Self {
            representative: NO_SUITABLE_GROUP.to_string(),
            codes: Vec::new(),
            tier: MatchTier::None,
        }
    }
}

/// Runs its strategies in order; the first match wins.
pub struct Matcher<'a> {
    strategies: Vec<Box<dyn MatchStrategy + 'a>>,
}

impl<'a> Matcher<'a> {
    pub fn new(strategies: Vec<Box<dyn MatchStrategy + 'a>>) -> Self {
        Self { strategies }
    }

    /// Substring, then translated fuzzy similarity, then oracle selection.
    pub fn standard(oracle: &'a dyn Oracle, options: &PipelineOptions) -> Self {
        let throttle = Throttle::new(options.call_delay);
        Self::new(vec![
            Box::new(SubstringTier),
            Box::new(FuzzyTier::new(
                oracle,
                throttle,
                options.fuzzy_threshold,
                options.condition_language.clone(),
                options.terminology_language.clone(),
            )),
            Box::new(OracleTier::new(oracle, throttle, options.fallback_threshold)),
        ])
    }

    /// Resolve `condition` against `clusters`.
    ///
    /// An empty map yields the "No Suitable Group" sentinel without consulting
    /// any tier. With the standard cascade a non-empty map always yields one of
    /// its clusters.
    pub fn resolve(&self, condition: &str, clusters: &ClusterMap) -> GroupMatch {
        if clusters.is_empty() {
            tracing::warn!(condition, "Cluster map is empty; cannot match condition");
            return GroupMatch::no_suitable_group();
        }

        for strategy in &self.strategies {
            let Some(representative) = strategy.try_match(condition, clusters) else {
                continue;
            };
            let Some(codes) = clusters.get(&representative) else {
                tracing::warn!(
                    condition,
                    representative = %representative,
                    tier = %strategy.tier(),
                    "Tier returned an unknown representative; ignoring"
                );
                continue;
            };
            tracing::info!(
                condition,
                representative = %representative,
                tier = %strategy.tier(),
                "Matched condition"
            );
            return GroupMatch {
                codes: codes.to_vec(),
                representative,
                tier: strategy.tier(),
            };
        }

        tracing::warn!(condition, "No tier matched condition");
        GroupMatch::no_suitable_group()
    }
}
