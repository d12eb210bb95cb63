//! Terminology source backed by a local JSON or CSV export of the code table.

use super::{CodeFilter, TerminologySource};
use crate::error::DtmapError;
use crate::model::TerminologyCode;
use std::collections::HashSet;
use std::path::Path;

/// In-memory terminology table loaded once from disk.
///
/// Codes are deduplicated (first occurrence wins) and served in code order.
#[derive(Debug, Clone)]
pub struct FileTerminology {
    name: String,
    codes: Vec<TerminologyCode>,
}

impl FileTerminology {
    /// Load a `.csv` file (header `code,description`, or the source table's
    /// `icd9_code,long_title` in either case) or a JSON array of code objects.
    /// Extra CSV columns such as `ROW_ID` and `SHORT_TITLE` are ignored.
    pub fn load(path: &Path) -> Result<Self, DtmapError> {
        if !path.exists() {
            return Err(DtmapError::MissingInput {
                path: path.to_path_buf(),
            });
        }

        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        let codes = if is_csv {
            let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
            reader
                .deserialize()
                .collect::<Result<Vec<TerminologyCode>, _>>()?
        } else {
            let bytes = std::fs::read(path)?;
            serde_json::from_slice(&bytes).map_err(|e| {
                DtmapError::Terminology(format!("{}: {}", path.display(), e))
            })?
        };

        let source = Self::from_codes(path.display().to_string(), codes);
        tracing::info!(
            source = %source.name,
            codes = source.codes.len(),
            "Loaded terminology table"
        );
        Ok(source)
    }

    pub fn from_codes(name: impl Into<String>, codes: Vec<TerminologyCode>) -> Self {
        let mut seen = HashSet::new();
        let mut codes: Vec<TerminologyCode> = codes
            .into_iter()
            .filter(|c| seen.insert(c.code.clone()))
            .collect();
        codes.sort_by(|a, b| a.code.cmp(&b.code));
        Self {
            name: name.into(),
            codes,
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl TerminologySource for FileTerminology {
    fn fetch(
        &self,
        filter: &CodeFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TerminologyCode>, DtmapError> {
        Ok(self
            .codes
            .iter()
            .filter(|c| filter.matches(c))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn lookup(&self, codes: &[String]) -> Result<Vec<TerminologyCode>, DtmapError> {
        let wanted: HashSet<&str> = codes.iter().map(|c| c.as_str()).collect();
        Ok(self
            .codes
            .iter()
            .filter(|c| wanted.contains(c.code.as_str()))
            .cloned()
            .collect())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
