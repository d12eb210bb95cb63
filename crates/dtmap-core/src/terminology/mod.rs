pub mod file;

use crate::error::DtmapError;
use crate::model::TerminologyCode;

pub use file::FileTerminology;

/// Optional restriction on which codes a terminology query returns.
///
/// Both parts are conjunctive; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeFilter {
    pub code_prefix: Option<String>,
    /// Case-insensitive substring of the description.
    pub description_contains: Option<String>,
}

impl CodeFilter {
    pub fn matches(&self, code: &TerminologyCode) -> bool {
        if let Some(ref prefix) = self.code_prefix {
            if !code.code.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(ref needle) = self.description_contains {
            if !code
                .description
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// Queryable store of (code, description) pairs.
pub trait TerminologySource {
    /// Fetch one page of codes matching `filter`, in a stable order.
    ///
    /// A page shorter than `limit` means the source is exhausted.
    fn fetch(
        &self,
        filter: &CodeFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TerminologyCode>, DtmapError>;

    /// Look up the current descriptions of specific codes.
    ///
    /// Unknown codes are omitted; results follow code order.
    fn lookup(&self, codes: &[String]) -> Result<Vec<TerminologyCode>, DtmapError>;

    /// Name of this source (for diagnostics).
    fn source_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_all() {
        let code = TerminologyCode::new("780.6", "Fever");
        assert!(CodeFilter::default().matches(&code));
    }

    #[test]
    fn test_filter_parts_are_conjunctive() {
        let filter = CodeFilter {
            code_prefix: Some("78".into()),
            description_contains: Some("FEV".into()),
        };
        assert!(filter.matches(&TerminologyCode::new("780.6", "Fever")));
        assert!(!filter.matches(&TerminologyCode::new("786.2", "Cough")));
        assert!(!filter.matches(&TerminologyCode::new("001.0", "Fever of cholera")));
    }
}
