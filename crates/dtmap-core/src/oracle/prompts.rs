//! Prompt builders for every oracle call made by the pipeline.

use super::Prompt;
use crate::model::{Category, ConditionProfile, TerminologyCode};

const CODING_ASSISTANT: &str = "You are a medical coding assistant.";
const TRANSLATION_ASSISTANT: &str = "You are a medical translation assistant.";
const CLASSIFICATION_ASSISTANT: &str = "You are a medical classification assistant.";

/// Ask the oracle to partition a batch of codes into clusters of equivalent codes.
pub fn clustering(batch: &[TerminologyCode]) -> Prompt {
    let listing = batch
        .iter()
        .map(|c| format!("{}: {}", c.code, c.description))
        .collect::<Vec<_>>()
        .join("\n");

    let user = format!(
        r#"I have the following list of diagnostic codes with their descriptions (one "code: description" per line):
{listing}

Group these codes into clusters where each cluster contains codes that represent the same clinical condition.
Return a JSON object in the following format:
{{
  "clusters": [
    {{
      "representative": "<a representative description for the cluster>",
      "codes": ["<code 1>", "<code 2>"]
    }}
  ]
}}

Only include clusters that have at least two codes. Do not include unique codes.
Respond with the JSON object only."#
    );

    Prompt {
        system: CODING_ASSISTANT.to_string(),
        user,
        max_tokens: 1024,
    }
}

/// Ask for a translation of a short medical phrase.
pub fn translation(text: &str, from_language: &str, to_language: &str) -> Prompt {
    Prompt {
        system: TRANSLATION_ASSISTANT.to_string(),
        user: format!(
            "Translate the following {from_language} medical condition into {to_language}. \
             Reply with the translation only: '{text}'"
        ),
        max_tokens: 60,
    }
}

/// Ask the oracle to pick the single best representative for a condition.
pub fn representative_selection(condition: &str, representatives: &[&str]) -> Prompt {
    let groups = representatives.join(", ");
    Prompt {
        system: CODING_ASSISTANT.to_string(),
        user: format!(
            r#"I have the following groups: {groups}
I have a decision-tree condition: "{condition}".
Based on the above groups, choose the one that best matches this condition.
Your answer must be exactly one of the groups listed above, with no other text. If none appear to match well, choose the closest match.
Which group best matches this condition?"#
        ),
        max_tokens: 60,
    }
}

/// Ask the oracle to name a terminology condition and its codes straight
/// from the profile, with no cluster map to choose from.
pub fn direct_mapping(profile: &ConditionProfile) -> Prompt {
    let questions = serde_json::to_string_pretty(&profile.questions).unwrap_or_else(|_| "[]".into());

    Prompt {
        system: CODING_ASSISTANT.to_string(),
        user: format!(
            r#"I have a decision-tree condition: "{}".
Its decision tree profile is as follows:
{questions}
Based on this information, select the best fitting condition from the diagnostic code table.
Provide your answer strictly in JSON format as follows:
{{
  "mimic_condition": "<representative condition>",
  "icd9_codes": ["<code 1>", "<code 2>"]
}}
Only provide one condition that best fits the decision-tree condition and its profile."#,
            profile.condition_name
        ),
        max_tokens: 150,
    }
}

/// Ask the oracle to place a condition in one category of the closed set.
pub fn category(profile: &ConditionProfile) -> Prompt {
    let labels = Category::ALL
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ");
    let questions = serde_json::to_string_pretty(&profile.questions).unwrap_or_else(|_| "[]".into());

    Prompt {
        system: CLASSIFICATION_ASSISTANT.to_string(),
        user: format!(
            r#"Given the decision-tree condition: "{}" and its decision tree profile:
{questions}
Determine the most appropriate category from the following list:
{labels}
Respond strictly in JSON format as follows:
{{
  "category": "<selected category>"
}}"#,
            profile.condition_name
        ),
        max_tokens: 60,
    }
}

/// Ask the oracle to judge whether a mapping is accurate.
///
/// The reply is free text ending in "Correct" or "Incorrect".
pub fn verification(
    representative: &str,
    codes: &[String],
    details: &[TerminologyCode],
    profile: &ConditionProfile,
    condition_language: &str,
) -> Prompt {
    let details = serde_json::to_string_pretty(details).unwrap_or_else(|_| "[]".into());
    let questions = serde_json::to_string_pretty(&profile.questions).unwrap_or_else(|_| "[]".into());

    Prompt {
        system: CODING_ASSISTANT.to_string(),
        user: format!(
            r#"I have a diagnostic code group with the representative name: "{representative}".
This group represents the following codes: {}.
The terminology database reports the following details for these codes:
{details}

I also have a decision-tree condition (in {condition_language}) and its decision tree profile:
Condition: "{}"
Profile: {questions}

Verify whether the group name "{representative}" is an accurate and clinically appropriate match for the above condition.
Provide a brief explanation and then state either "Correct" or "Incorrect"."#,
            codes.join(", "),
            profile.condition_name
        ),
        max_tokens: 300,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clustering_prompt_lists_every_code() {
        let batch = vec![
            TerminologyCode::new("780.6", "Fever"),
            TerminologyCode::new("786.2", "Cough"),
        ];
        let prompt = clustering(&batch);
        assert!(prompt.user.contains("780.6: Fever"));
        assert!(prompt.user.contains("786.2: Cough"));
        assert!(prompt.user.contains("\"clusters\""));
    }

    #[test]
    fn test_category_prompt_spells_out_enumeration() {
        let profile = ConditionProfile {
            condition_name: "哮喘".into(),
            questions: vec!["Does the patient have wheeze (symptom)?".into()],
        };
        let prompt = category(&profile);
        for cat in Category::ALL {
            assert!(prompt.user.contains(cat.label()), "missing {}", cat.label());
        }
        assert!(prompt.user.contains("wheeze"));
    }

    #[test]
    fn test_direct_prompt_names_reply_keys() {
        let profile = ConditionProfile {
            condition_name: "发热".into(),
            questions: vec!["Does the patient have 发热 (临床表现)?".into()],
        };
        let prompt = direct_mapping(&profile);
        assert!(prompt.user.contains("\"发热\""));
        assert!(prompt.user.contains("\"mimic_condition\""));
        assert!(prompt.user.contains("\"icd9_codes\""));
        assert_eq!(prompt.max_tokens, 150);
    }

    #[test]
    fn test_selection_prompt_lists_groups() {
        let prompt = representative_selection("发热", &["Fever", "Cough"]);
        assert!(prompt.user.contains("Fever, Cough"));
        assert!(prompt.user.contains("发热"));
    }
}
