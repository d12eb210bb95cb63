//! Runtime configuration: oracle credentials from the environment and
//! tunable pipeline options.

use crate::error::DtmapError;
use crate::terminology::CodeFilter;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_CLUSTER_MAP_FILE: &str = "mimic_mapping.json";
pub const DEFAULT_MAPPINGS_FILE: &str = "text2dt_mimic_mapping.json";
pub const DEFAULT_VERIFICATION_FILE: &str = "verification_output.json";

/// Oracle connection settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `OPENAI_API_KEY` may be absent here; commands that call the oracle check
    /// for it with [`Config::require_api_key`] before doing any work.
    pub fn from_env() -> Result<Self, DtmapError> {
        let http_timeout = match std::env::var("DTMAP_HTTP_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    DtmapError::Config(format!(
                        "DTMAP_HTTP_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
                    ))
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(60),
        };

        Ok(Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            model: std::env::var("DTMAP_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            http_timeout,
        })
    }

    pub fn require_api_key(&self) -> Result<&str, DtmapError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| DtmapError::Config("OPENAI_API_KEY not set in environment".into()))
    }
}

/// Knobs for clustering, matching and checkpointing.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of terminology codes sent to the oracle per clustering call.
    pub batch_size: usize,
    /// Minimum similarity for the fuzzy tier to accept a cluster.
    pub fuzzy_threshold: f64,
    /// Minimum similarity for the oracle tier's closest-match fallback.
    pub fallback_threshold: f64,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Pause after every oracle call made while matching and classifying.
    pub call_delay: Duration,
    /// Pause after each terminology batch.
    pub batch_delay: Duration,
    /// Flush the mapping output after this many records.
    pub flush_every: usize,
    pub flush_delay: Duration,
    /// Language the decision-tree conditions are written in.
    pub condition_language: String,
    /// Language of the terminology descriptions.
    pub terminology_language: String,
    pub code_filter: CodeFilter,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            fuzzy_threshold: 0.8,
            fallback_threshold: 0.7,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
            call_delay: Duration::from_secs(2),
            batch_delay: Duration::from_secs(2),
            flush_every: 10,
            flush_delay: Duration::from_secs(1),
            condition_language: "Chinese".into(),
            terminology_language: "English".into(),
            code_filter: CodeFilter::default(),
        }
    }
}

impl PipelineOptions {
    /// Defaults with every delay set to zero.
    pub fn without_delays() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            call_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
            flush_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), DtmapError> {
        if self.batch_size == 0 {
            return Err(DtmapError::Config("batch size must be at least 1".into()));
        }
        if self.flush_every == 0 {
            return Err(DtmapError::Config("flush interval must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(DtmapError::Config("retry attempts must be at least 1".into()));
        }
        for (name, value) in [
            ("fuzzy threshold", self.fuzzy_threshold),
            ("fallback threshold", self.fallback_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DtmapError::Config(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Where the orchestrator writes its checkpoints.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub cluster_map: PathBuf,
    pub mappings: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            cluster_map: PathBuf::from(DEFAULT_CLUSTER_MAP_FILE),
            mappings: PathBuf::from(DEFAULT_MAPPINGS_FILE),
        }
    }
}
