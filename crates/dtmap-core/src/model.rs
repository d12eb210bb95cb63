use serde::{Deserialize, Serialize};
use std::fmt;

/// Representative reported when the cluster map is empty.
pub const NO_SUITABLE_GROUP: &str = "No Suitable Group";

/// A diagnostic code and its description from the terminology table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminologyCode {
    #[serde(alias = "icd9_code", alias = "ICD9_CODE")]
    pub code: String,
    #[serde(alias = "long_title", alias = "LONG_TITLE")]
    pub description: String,
}

impl TerminologyCode {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// A decision-tree condition flattened to its name and yes/no questions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionProfile {
    pub condition_name: String,
    /// Criterion questions in document order. Earlier questions gate later ones.
    pub questions: Vec<String>,
}

/// Clinical category assigned to a condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "cardiovascular")]
    Cardiovascular,
    #[serde(rename = "respiratory")]
    Respiratory,
    #[serde(rename = "gastroenterology")]
    Gastroenterology,
    #[serde(rename = "musculoskeletal")]
    Musculoskeletal,
    #[serde(rename = "neurological")]
    Neurological,
    #[serde(rename = "endocrine")]
    Endocrine,
    #[serde(rename = "obs and gyne")]
    ObsAndGyne,
    #[serde(rename = "paediatrics")]
    Paediatrics,
    #[serde(rename = "ENT")]
    Ent,
    #[serde(rename = "ophthalmology")]
    Ophthalmology,
    #[serde(rename = "dermatology")]
    Dermatology,
    #[serde(rename = "other")]
    #[default]
    Other,
}

impl Category {
    /// Every category, in the order they are offered to the oracle.
    pub const ALL: [Category; 12] = [
        Category::Cardiovascular,
        Category::Respiratory,
        Category::Gastroenterology,
        Category::Musculoskeletal,
        Category::Neurological,
        Category::Endocrine,
        Category::ObsAndGyne,
        Category::Paediatrics,
        Category::Ent,
        Category::Ophthalmology,
        Category::Dermatology,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Cardiovascular => "cardiovascular",
            Category::Respiratory => "respiratory",
            Category::Gastroenterology => "gastroenterology",
            Category::Musculoskeletal => "musculoskeletal",
            Category::Neurological => "neurological",
            Category::Endocrine => "endocrine",
            Category::ObsAndGyne => "obs and gyne",
            Category::Paediatrics => "paediatrics",
            Category::Ent => "ENT",
            Category::Ophthalmology => "ophthalmology",
            Category::Dermatology => "dermatology",
            Category::Other => "other",
        }
    }

    /// Parse a label case-insensitively. Returns `None` for anything outside
    /// the closed set.
    pub fn from_label(s: &str) -> Option<Category> {
        let lower = s.trim().to_lowercase();
        let lower = lower.replace(['-', '_'], " ");
        let found = Category::ALL
            .iter()
            .find(|c| c.label().to_lowercase() == lower)
            .copied();
        if found.is_some() {
            return found;
        }
        match lower.as_str() {
            "obstetrics and gynaecology" | "obstetrics and gynecology" | "obs & gyne"
            | "obstetrics" | "gynaecology" | "gynecology" => Some(Category::ObsAndGyne),
            "ear nose and throat" | "otolaryngology" => Some(Category::Ent),
            "pediatrics" => Some(Category::Paediatrics),
            "neurology" => Some(Category::Neurological),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Which tier of the matching cascade produced a mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Substring,
    Fuzzy,
    Oracle,
    /// Named by the oracle straight from the profile, without a cluster map.
    Direct,
    /// No cluster was available; the representative is the sentinel.
    #[default]
    None,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTier::Substring => write!(f, "substring"),
            MatchTier::Fuzzy => write!(f, "fuzzy"),
            MatchTier::Oracle => write!(f, "oracle"),
            MatchTier::Direct => write!(f, "direct"),
            MatchTier::None => write!(f, "none"),
        }
    }
}

/// One condition resolved to a cluster and a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub condition_name: String,
    pub matched_representative: String,
    pub matched_codes: Vec<String>,
    #[serde(default)]
    pub match_tier: MatchTier,
    #[serde(default)]
    pub category: Category,
    pub profile: ConditionProfile,
}

impl MappingRecord {
    /// True if the record points at a real cluster with at least one code.
    pub fn has_codes(&self) -> bool {
        self.matched_representative != NO_SUITABLE_GROUP && !self.matched_codes.is_empty()
    }
}

/// Verdict extracted from the oracle's free-text judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Undetermined,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Correct => write!(f, "Correct"),
            Verdict::Incorrect => write!(f, "Incorrect"),
            Verdict::Undetermined => write!(f, "Undetermined"),
        }
    }
}

/// Result of auditing one sampled mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub condition_name: String,
    pub representative: String,
    pub codes: Vec<String>,
    /// Descriptions re-queried from the terminology source.
    pub code_details: Vec<TerminologyCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_translation: Option<String>,
    pub questions: Vec<String>,
    pub judgment: String,
    pub verdict: Verdict,
}
