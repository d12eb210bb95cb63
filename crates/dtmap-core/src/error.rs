use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DtmapError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("required input file not found: {path}")]
    MissingInput { path: PathBuf },

    #[error("failed to load decision-tree records from {path}: {reason}")]
    RecordsLoad { path: PathBuf, reason: String },

    #[error("terminology source error: {0}")]
    Terminology(String),

    #[error("oracle request failed: {0}")]
    OracleTransport(String),

    #[error("oracle reply could not be parsed: {0}")]
    OracleShape(String),

    #[error("failed to write checkpoint {path}: {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    #[error("unknown category '{0}' (run `dtmap categories` for the list)")]
    UnknownCategory(String),

    #[error("no mapping record with matched codes is available to verify")]
    NoEligibleRecord,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
