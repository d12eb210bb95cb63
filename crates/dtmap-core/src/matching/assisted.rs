use super::MatchStrategy;
use crate::cluster::ClusterMap;
use crate::model::MatchTier;
use crate::oracle::{prompts, Oracle, Throttle};
use crate::parsing::close_match;

/// Asks the oracle to choose among all representatives.
///
/// Never declines on a non-empty map: an answer that is not a known
/// representative falls back to the closest representative by similarity,
/// and failing that to the first representative in map order.
pub struct OracleTier<'a> {
    oracle: &'a dyn Oracle,
    throttle: Throttle,
    fallback_threshold: f64,
}

impl<'a> OracleTier<'a> {
    pub fn new(oracle: &'a dyn Oracle, throttle: Throttle, fallback_threshold: f64) -> Self {
        Self {
            oracle,
            throttle,
            fallback_threshold,
        }
    }

    fn ask(&self, condition: &str, representatives: &[&str]) -> String {
        let result = self
            .oracle
            .classify(&prompts::representative_selection(condition, representatives));
        self.throttle.pause();
        match result {
            Ok(reply) => {
                tracing::debug!(condition, reply = %reply, "Oracle group selection");
                reply
                    .trim()
                    .trim_matches(|c: char| c == '"' || c == '\'')
                    .trim()
                    .to_string()
            }
            Err(e) => {
                tracing::warn!(condition, error = %e, "Oracle group selection failed");
                String::new()
            }
        }
    }
}

impl MatchStrategy for OracleTier<'_> {
    fn tier(&self) -> MatchTier {
        MatchTier::Oracle
    }

    fn try_match(&self, condition: &str, clusters: &ClusterMap) -> Option<String> {
        let representatives = clusters.representatives();
        let first = *representatives.first()?;

        let answer = self.ask(condition, &representatives);
        if !answer.eq_ignore_ascii_case("unknown") && clusters.contains(&answer) {
            return Some(answer);
        }

        if let Some(closest) = close_match(condition, &representatives, self.fallback_threshold) {
            tracing::info!(condition, representative = closest, "Closest-match fallback");
            return Some(closest.to_string());
        }

        tracing::info!(
            condition,
            representative = first,
            "No close match; defaulting to first group"
        );
        Some(first.to_string())
    }
}
