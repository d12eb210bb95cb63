pub mod chat;
pub mod prompts;

use crate::error::DtmapError;
use std::time::Duration;

pub use chat::ChatOracle;

/// A natural-language request to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Upper bound on the length of the reply.
    pub max_tokens: u32,
}

/// External semantic service answering classification and matching prompts.
///
/// Replies are free text; callers that expect JSON run them through
/// [`crate::parsing::parse_oracle_json`].
pub trait Oracle: Send + Sync {
    fn classify(&self, prompt: &Prompt) -> Result<String, DtmapError>;

    /// Name of this oracle backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Fixed pause after an external call to stay within quota limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Throttle {
    delay: Duration,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// A throttle that never sleeps.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

/// Translate a short phrase with the oracle, pausing afterwards.
///
/// Returns `None` when the call fails or the reply is blank.
pub fn translate(
    oracle: &dyn Oracle,
    throttle: &Throttle,
    text: &str,
    from_language: &str,
    to_language: &str,
) -> Option<String> {
    let result = oracle.classify(&prompts::translation(text, from_language, to_language));
    throttle.pause();
    match result {
        Ok(reply) => {
            let translated = reply.trim().trim_matches(|c: char| c == '\'' || c == '"').trim();
            if translated.is_empty() {
                None
            } else {
                tracing::debug!(text, translated, "Translated");
                Some(translated.to_string())
            }
        }
        Err(e) => {
            tracing::warn!(text, error = %e, "Translation failed");
            None
        }
    }
}
