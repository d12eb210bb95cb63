//! Decision-tree records and their flattening into condition profiles.

use crate::error::DtmapError;
use crate::model::ConditionProfile;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Separates the condition name from the rest of a record's headline text.
pub const CONDITION_DELIMITER: char = '@';

/// Node role whose triples become profile questions.
pub const CRITERION_ROLE: &str = "C";

/// A (subject, relation, object) attribute carried by a tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple(pub String, pub String, pub String);

impl Triple {
    pub fn relation(&self) -> &str {
        &self.1
    }

    pub fn object(&self) -> &str {
        &self.2
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// `"C"` for criterion nodes, `"D"` for decision nodes.
    pub role: String,
    #[serde(default)]
    pub triples: Vec<Triple>,
    /// Logical relation between the node's triples ("and", "or", "null").
    #[serde(default)]
    pub logical_rel: Option<String>,
}

impl TreeNode {
    pub fn is_criterion(&self) -> bool {
        self.role == CRITERION_ROLE
    }
}

/// One raw decision-tree record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTreeRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tree: Vec<TreeNode>,
}

impl DecisionTreeRecord {
    /// Text before the first delimiter, or the whole headline without one.
    pub fn condition_name(&self) -> &str {
        match self.text.split_once(CONDITION_DELIMITER) {
            Some((name, _)) => name.trim(),
            None => self.text.trim(),
        }
    }
}

/// Flatten a record into its condition name and criterion questions.
///
/// Only criterion nodes contribute, one question per triple, in document order.
pub fn extract_profile(record: &DecisionTreeRecord) -> ConditionProfile {
    let questions = record
        .tree
        .iter()
        .filter(|node| node.is_criterion())
        .flat_map(|node| node.triples.iter())
        .map(|t| format!("Does the patient have {} ({})?", t.object(), t.relation()))
        .collect();

    ConditionProfile {
        condition_name: record.condition_name().to_string(),
        questions,
    }
}

/// Load decision-tree records from a JSON array file.
///
/// Elements that do not deserialize as a record are skipped with a warning.
pub fn load_records(path: &Path) -> Result<Vec<DecisionTreeRecord>, DtmapError> {
    if !path.exists() {
        return Err(DtmapError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| DtmapError::RecordsLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_records(&content, path)
}

/// Parse decision-tree records from a JSON array string.
pub fn parse_records(json: &str, source: &Path) -> Result<Vec<DecisionTreeRecord>, DtmapError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(json).map_err(|e| DtmapError::RecordsLoad {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut records = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<DecisionTreeRecord>(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "Skipping malformed decision-tree record");
            }
        }
    }

    tracing::info!(
        records = records.len(),
        source = %source.display(),
        "Loaded decision-tree records"
    );
    Ok(records)
}
