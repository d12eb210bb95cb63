use super::GroupMatch;
use crate::model::{ConditionProfile, MatchTier};
use crate::oracle::{prompts, Oracle, Throttle};
use crate::parsing::parse_oracle_json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DirectReply {
    #[serde(default)]
    mimic_condition: Option<String>,
    #[serde(default)]
    icd9_codes: Vec<String>,
}

/// Maps a condition without a cluster map: the oracle names a terminology
/// condition and its codes straight from the profile.
///
/// Never fails. Transport errors, unparsable replies and replies without a
/// condition name all yield the "No Suitable Group" sentinel.
pub struct DirectMapper<'a> {
    oracle: &'a dyn Oracle,
    throttle: Throttle,
}

impl<'a> DirectMapper<'a> {
    pub fn new(oracle: &'a dyn Oracle, throttle: Throttle) -> Self {
        Self { oracle, throttle }
    }

    pub fn map(&self, profile: &ConditionProfile) -> GroupMatch {
        let result = self.oracle.classify(&prompts::direct_mapping(profile));
        self.throttle.pause();

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    condition = %profile.condition_name,
                    error = %e,
                    "Direct mapping request failed"
                );
                return GroupMatch::no_suitable_group();
            }
        };

        let group = group_from_reply(&reply);
        tracing::info!(
            condition = %profile.condition_name,
            representative = %group.representative,
            codes = group.codes.len(),
            "Mapped condition directly"
        );
        group
    }
}

/// Interpret a raw `{"mimic_condition": ..., "icd9_codes": [...]}` reply.
pub fn group_from_reply(reply: &str) -> GroupMatch {
    let parsed = match parse_oracle_json::<DirectReply>(reply) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, "Unparsable direct mapping reply");
            return GroupMatch::no_suitable_group();
        }
    };

    let representative = parsed.mimic_condition.as_deref().map(str::trim).unwrap_or("");
    if representative.is_empty() {
        return GroupMatch::no_suitable_group();
    }

    let mut codes: Vec<String> = Vec::with_capacity(parsed.icd9_codes.len());
    for code in parsed.icd9_codes {
        let code = code.trim();
        if !code.is_empty() && !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
    }

    GroupMatch {
        representative: representative.to_string(),
        codes,
        tier: MatchTier::Direct,
    }
}
