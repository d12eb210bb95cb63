use super::MatchStrategy;
use crate::cluster::ClusterMap;
use crate::model::MatchTier;

/// Cheap literal containment check, case-insensitive.
///
/// A cluster matches when the condition contains its representative, the
/// representative contains the condition, or the condition contains one of
/// its member codes. The first cluster in map order wins; this is not a
/// ranked best match.
pub struct SubstringTier;

impl MatchStrategy for SubstringTier {
    fn tier(&self) -> MatchTier {
        MatchTier::Substring
    }

    fn try_match(&self, condition: &str, clusters: &ClusterMap) -> Option<String> {
        let condition = condition.trim().to_lowercase();
        if condition.is_empty() {
            return None;
        }

        for (representative, codes) in clusters.iter() {
            let rep = representative.trim().to_lowercase();
            if !rep.is_empty() && (condition.contains(&rep) || rep.contains(&condition)) {
                tracing::debug!(representative, "Substring match on representative");
                return Some(representative.to_string());
            }
            let code_hit = codes
                .iter()
                .map(|c| c.trim().to_lowercase())
                .any(|c| !c.is_empty() && condition.contains(&c));
            if code_hit {
                tracing::debug!(representative, "Substring match on member code");
                return Some(representative.to_string());
            }
        }

        None
    }
}
