use crate::model::TerminologyCode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Running map of representative label -> member codes.
///
/// Iteration follows insertion order. Persisted as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterMap {
    clusters: IndexMap<String, Vec<String>>,
}

impl ClusterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, representative: &str) -> Option<&[String]> {
        self.clusters.get(representative).map(|c| c.as_slice())
    }

    pub fn contains(&self, representative: &str) -> bool {
        self.clusters.contains_key(representative)
    }

    /// Representatives in map order.
    pub fn representatives(&self) -> Vec<&str> {
        self.clusters.keys().map(|k| k.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.clusters
            .iter()
            .map(|(rep, codes)| (rep.as_str(), codes.as_slice()))
    }

    /// Add a cluster, merging into an existing cluster with the same representative.
    ///
    /// Member codes of a colliding cluster are unioned (existing codes first,
    /// duplicates skipped) and the cluster keeps its original position, so a
    /// later batch can never drop codes an earlier batch contributed. Empty
    /// code lists are ignored.
    pub fn merge_cluster(&mut self, representative: &str, codes: Vec<String>) {
        if codes.is_empty() {
            return;
        }
        match self.clusters.get_mut(representative) {
            Some(existing) => {
                tracing::debug!(
                    representative,
                    added = codes.len(),
                    "Merging codes into existing cluster"
                );
                for code in codes {
                    if !existing.contains(&code) {
                        existing.push(code);
                    }
                }
            }
            None => {
                self.clusters.insert(representative.to_string(), codes);
            }
        }
    }

    /// Add a code as its own cluster, keyed by its description.
    pub fn add_singleton(&mut self, code: &TerminologyCode) {
        let key = if code.description.trim().is_empty() {
            code.code.as_str()
        } else {
            code.description.as_str()
        };
        self.merge_cluster(key, vec![code.code.clone()]);
    }

    /// Every member code across all clusters.
    pub fn all_codes(&self) -> HashSet<&str> {
        self.clusters
            .values()
            .flat_map(|codes| codes.iter().map(|c| c.as_str()))
            .collect()
    }
}

impl FromIterator<(String, Vec<String>)> for ClusterMap {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut map = ClusterMap::new();
        for (rep, codes) in iter {
            map.merge_cluster(&rep, codes);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut map = ClusterMap::new();
        map.merge_cluster("Zoster", vec!["053.9".into()]);
        map.merge_cluster("Asthma", vec!["493.90".into()]);
        assert_eq!(map.representatives(), vec!["Zoster", "Asthma"]);
        let (rep, codes) = map.iter().next().unwrap();
        assert_eq!((rep, codes), ("Zoster", &["053.9".to_string()][..]));
    }

    #[test]
    fn test_collision_merges_codes() {
        let mut map = ClusterMap::new();
        map.merge_cluster("Asthma", vec!["493.90".into(), "493.00".into()]);
        map.merge_cluster("Hypertension", vec!["401.9".into()]);
        map.merge_cluster("Asthma", vec!["493.00".into(), "493.92".into()]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.representatives(), vec!["Asthma", "Hypertension"]);
        assert_eq!(
            map.get("Asthma").unwrap(),
            &["493.90".to_string(), "493.00".to_string(), "493.92".to_string()]
        );
    }

    #[test]
    fn test_singletons_keyed_by_description() {
        let mut map = ClusterMap::new();
        map.add_singleton(&TerminologyCode::new("780.6", "Fever"));
        map.add_singleton(&TerminologyCode::new("780.61", "Fever"));
        map.add_singleton(&TerminologyCode::new("999.0", "  "));
        assert_eq!(map.get("Fever").unwrap().len(), 2);
        assert_eq!(map.get("999.0").unwrap(), &["999.0".to_string()]);
    }

    #[test]
    fn test_empty_cluster_ignored() {
        let mut map = ClusterMap::new();
        map.merge_cluster("Nothing", vec![]);
        assert!(map.is_empty());
    }

    #[test]
    fn test_serializes_as_plain_object_in_order() {
        let mut map = ClusterMap::new();
        map.merge_cluster("B", vec!["2".into()]);
        map.merge_cluster("A", vec!["1".into()]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"B":["2"],"A":["1"]}"#);
        let back: ClusterMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
