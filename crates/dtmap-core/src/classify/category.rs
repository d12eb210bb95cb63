use crate::model::{Category, ConditionProfile};
use crate::oracle::{prompts, Oracle, Throttle};
use crate::parsing::parse_oracle_json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CategoryReply {
    #[serde(default)]
    category: Option<serde_json::Value>,
}

/// Assigns each condition one label from the closed [`Category`] set.
///
/// Never fails: transport errors, unparsable replies and labels outside the
/// set all yield [`Category::Other`].
pub struct CategoryClassifier<'a> {
    oracle: &'a dyn Oracle,
    throttle: Throttle,
}

impl<'a> CategoryClassifier<'a> {
    pub fn new(oracle: &'a dyn Oracle, throttle: Throttle) -> Self {
        Self { oracle, throttle }
    }

    pub fn classify(&self, profile: &ConditionProfile) -> Category {
        let result = self.oracle.classify(&prompts::category(profile));
        self.throttle.pause();

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    condition = %profile.condition_name,
                    error = %e,
                    "Category request failed; using 'other'"
                );
                return Category::Other;
            }
        };

        let category = category_from_reply(&reply);
        tracing::info!(
            condition = %profile.condition_name,
            category = %category,
            "Assigned category"
        );
        category
    }
}

/// Interpret a raw oracle reply as a category, coercing anything invalid to `Other`.
pub fn category_from_reply(reply: &str) -> Category {
    match parse_oracle_json::<CategoryReply>(reply) {
        Ok(CategoryReply {
            category: Some(serde_json::Value::String(label)),
        }) => Category::from_label(&label).unwrap_or_else(|| {
            tracing::debug!(label = %label, "Label outside the category set");
            Category::Other
        }),
        Ok(_) => Category::Other,
        Err(e) => {
            tracing::debug!(error = %e, "Unparsable category reply");
            Category::Other
        }
    }
}
