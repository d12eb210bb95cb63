use super::MatchStrategy;
use crate::cluster::ClusterMap;
use crate::model::MatchTier;
use crate::oracle::{translate, Oracle, Throttle};
use crate::parsing::ratio;

/// Translates the condition into the terminology's language and accepts the
/// most similar representative if it clears the threshold.
pub struct FuzzyTier<'a> {
    oracle: &'a dyn Oracle,
    throttle: Throttle,
    threshold: f64,
    from_language: String,
    to_language: String,
}

impl<'a> FuzzyTier<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        throttle: Throttle,
        threshold: f64,
        from_language: String,
        to_language: String,
    ) -> Self {
        Self {
            oracle,
            throttle,
            threshold,
            from_language,
            to_language,
        }
    }
}

/// Highest-ratio representative for `text`; ties keep the first in map order.
pub fn best_by_ratio<'m>(text: &str, clusters: &'m ClusterMap) -> Option<(&'m str, f64)> {
    let text = text.to_lowercase();
    let mut best: Option<(&str, f64)> = None;
    for representative in clusters.representatives() {
        let score = ratio(&text, &representative.to_lowercase());
        tracing::debug!(representative, score, "Similarity");
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((representative, score)),
        }
    }
    best
}

impl MatchStrategy for FuzzyTier<'_> {
    fn tier(&self) -> MatchTier {
        MatchTier::Fuzzy
    }

    fn try_match(&self, condition: &str, clusters: &ClusterMap) -> Option<String> {
        let translated = translate(
            self.oracle,
            &self.throttle,
            condition,
            &self.from_language,
            &self.to_language,
        )
        .unwrap_or_else(|| condition.to_string());

        let (representative, score) = best_by_ratio(&translated, clusters)?;
        if score >= self.threshold {
            Some(representative.to_string())
        } else {
            tracing::debug!(
                condition,
                translated = %translated,
                best = representative,
                score,
                "No fuzzy match above threshold"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{down_oracle, ScriptedOracle};

    fn tier(oracle: &dyn Oracle) -> FuzzyTier<'_> {
        FuzzyTier::new(oracle, Throttle::none(), 0.8, "Chinese".into(), "English".into())
    }

    fn clusters(reps: &[&str]) -> ClusterMap {
        reps.iter()
            .enumerate()
            .map(|(i, r)| (r.to_string(), vec![format!("{i}")]))
            .collect()
    }

    #[test]
    fn test_ratio_exactly_at_threshold_accepted() {
        // "abcde" vs "abcdx": 2 * 4 / 10 = 0.8
        let oracle = ScriptedOracle::new(vec![Ok("abcde")]);
        let m = tier(&oracle).try_match("条件", &clusters(&["abcdx"]));
        assert_eq!(m.as_deref(), Some("abcdx"));
    }

    #[test]
    fn test_ratio_below_threshold_rejected() {
        // "abcd" vs "abcx": 2 * 3 / 8 = 0.75
        let oracle = ScriptedOracle::new(vec![Ok("abcd")]);
        let m = tier(&oracle).try_match("条件", &clusters(&["abcx"]));
        assert_eq!(m, None);
    }

    #[test]
    fn test_comparison_is_case_insensitive() {
        let oracle = ScriptedOracle::new(vec![Ok("ASTHMA")]);
        let m = tier(&oracle).try_match("哮喘", &clusters(&["Fever", "Asthma"]));
        assert_eq!(m.as_deref(), Some("Asthma"));
    }

    #[test]
    fn test_ties_keep_first_in_map_order() {
        let oracle = ScriptedOracle::new(vec![Ok("abcde")]);
        let m = tier(&oracle).try_match("条件", &clusters(&["abcdx", "abcdy"]));
        assert_eq!(m.as_deref(), Some("abcdx"));
    }

    #[test]
    fn test_translation_failure_uses_original_text() {
        let oracle = down_oracle();
        let m = tier(&oracle).try_match("Asthma", &clusters(&["Fever", "asthma"]));
        assert_eq!(m.as_deref(), Some("asthma"));
    }

    #[test]
    fn test_quoted_translation_unwrapped() {
        let oracle = ScriptedOracle::new(vec![Ok("'Asthma'")]);
        let m = tier(&oracle).try_match("哮喘", &clusters(&["Asthma"]));
        assert_eq!(m.as_deref(), Some("Asthma"));
    }
}
