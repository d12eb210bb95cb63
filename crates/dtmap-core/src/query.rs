//! Lookups over a finished mapping output.

use crate::error::DtmapError;
use crate::model::{Category, MappingRecord};

/// Parse a user-supplied category label, rejecting anything outside the set.
pub fn parse_category(label: &str) -> Result<Category, DtmapError> {
    Category::from_label(label).ok_or_else(|| DtmapError::UnknownCategory(label.trim().to_string()))
}

/// Records assigned to `category`.
pub fn by_category(records: &[MappingRecord], category: Category) -> Vec<&MappingRecord> {
    records.iter().filter(|r| r.category == category).collect()
}

/// Records whose matched cluster contains `code`.
pub fn by_code<'r>(records: &'r [MappingRecord], code: &str) -> Vec<&'r MappingRecord> {
    let code = code.trim();
    records
        .iter()
        .filter(|r| r.matched_codes.iter().any(|c| c == code))
        .collect()
}

/// Record count for every category, in [`Category::ALL`] order.
pub fn category_counts(records: &[MappingRecord]) -> Vec<(Category, usize)> {
    Category::ALL
        .iter()
        .map(|&cat| (cat, records.iter().filter(|r| r.category == cat).count()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConditionProfile, MatchTier};

    fn record(name: &str, category: Category, codes: &[&str]) -> MappingRecord {
        MappingRecord {
            condition_name: name.into(),
            matched_representative: "rep".into(),
            matched_codes: codes.iter().map(|c| c.to_string()).collect(),
            match_tier: MatchTier::Oracle,
            category,
            profile: ConditionProfile::default(),
        }
    }

    fn records() -> Vec<MappingRecord> {
        vec![
            record("哮喘", Category::Respiratory, &["493.90"]),
            record("高血压", Category::Cardiovascular, &["401.9"]),
            record("咳嗽", Category::Respiratory, &["786.2", "493.90"]),
        ]
    }

    #[test]
    fn test_by_category() {
        let records = records();
        let found = by_category(&records, Category::Respiratory);
        assert_eq!(found.len(), 2);
        assert!(by_category(&records, Category::Ent).is_empty());
    }

    #[test]
    fn test_parse_category_rejects_unknown() {
        assert_eq!(parse_category("Obs and Gyne").unwrap(), Category::ObsAndGyne);
        assert!(matches!(
            parse_category(" oncology "),
            Err(DtmapError::UnknownCategory(label)) if label == "oncology"
        ));
    }

    #[test]
    fn test_by_code_reverse_lookup() {
        let records = records();
        let names: Vec<&str> = by_code(&records, " 493.90 ")
            .iter()
            .map(|r| r.condition_name.as_str())
            .collect();
        assert_eq!(names, vec!["哮喘", "咳嗽"]);
        assert!(by_code(&records, "493.9").is_empty());
    }

    #[test]
    fn test_counts_cover_every_category() {
        let counts = category_counts(&records());
        assert_eq!(counts.len(), Category::ALL.len());
        assert_eq!(counts[0], (Category::Cardiovascular, 1));
        assert_eq!(counts[1], (Category::Respiratory, 2));
        assert_eq!(counts.iter().map(|(_, n)| n).sum::<usize>(), 3);
    }
}
