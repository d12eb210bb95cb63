//! Spot-check one finished mapping with the oracle.

use crate::config::PipelineOptions;
use crate::error::DtmapError;
use crate::model::{MappingRecord, VerificationReport, Verdict};
use crate::oracle::{prompts, translate, Oracle, Throttle};
use crate::terminology::TerminologySource;
use rand::seq::SliceRandom;
use rand::Rng;

/// Judgment recorded when the oracle could not be reached.
pub const VERIFICATION_ERROR: &str = "Error during verification.";

/// Audits sampled mappings against live terminology descriptions.
///
/// Read-only: reports never feed back into the mapping output.
pub struct Verifier<'a> {
    oracle: &'a dyn Oracle,
    source: &'a dyn TerminologySource,
    throttle: Throttle,
    condition_language: String,
    terminology_language: String,
}

impl<'a> Verifier<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        source: &'a dyn TerminologySource,
        options: &PipelineOptions,
    ) -> Self {
        Self {
            oracle,
            source,
            throttle: Throttle::new(options.call_delay),
            condition_language: options.condition_language.clone(),
            terminology_language: options.terminology_language.clone(),
        }
    }

    /// Pick one record uniformly among those mapped to a real cluster.
    pub fn sample<'r, R: Rng + ?Sized>(
        records: &'r [MappingRecord],
        rng: &mut R,
    ) -> Option<&'r MappingRecord> {
        let eligible: Vec<&MappingRecord> = records.iter().filter(|r| r.has_codes()).collect();
        eligible.choose(rng).copied()
    }

    /// Sample a record and verify it.
    pub fn verify_sample<R: Rng + ?Sized>(
        &self,
        records: &[MappingRecord],
        rng: &mut R,
        back_translate: bool,
    ) -> Result<VerificationReport, DtmapError> {
        let record = Self::sample(records, rng).ok_or(DtmapError::NoEligibleRecord)?;
        self.verify(record, back_translate)
    }

    pub fn verify(
        &self,
        record: &MappingRecord,
        back_translate: bool,
    ) -> Result<VerificationReport, DtmapError> {
        let code_details = self.source.lookup(&record.matched_codes)?;
        if code_details.len() < record.matched_codes.len() {
            tracing::warn!(
                requested = record.matched_codes.len(),
                found = code_details.len(),
                "Some mapped codes are missing from the terminology source"
            );
        }

        let back_translation = if back_translate {
            translate(
                self.oracle,
                &self.throttle,
                &record.matched_representative,
                &self.terminology_language,
                &self.condition_language,
            )
        } else {
            None
        };

        let prompt = prompts::verification(
            &record.matched_representative,
            &record.matched_codes,
            &code_details,
            &record.profile,
            &self.condition_language,
        );
        let judgment = match self.oracle.classify(&prompt) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Verification request failed");
                VERIFICATION_ERROR.to_string()
            }
        };
        self.throttle.pause();

        let verdict = parse_verdict(&judgment);
        tracing::info!(
            condition = %record.condition_name,
            representative = %record.matched_representative,
            verdict = %verdict,
            "Verified mapping"
        );

        Ok(VerificationReport {
            condition_name: record.condition_name.clone(),
            representative: record.matched_representative.clone(),
            codes: record.matched_codes.clone(),
            code_details,
            back_translation,
            questions: record.profile.questions.clone(),
            judgment,
            verdict,
        })
    }
}

/// The last standalone "correct" or "incorrect" in the text decides.
pub fn parse_verdict(text: &str) -> Verdict {
    text.split(|c: char| !c.is_alphanumeric())
        .rev()
        .find_map(|word| {
            if word.eq_ignore_ascii_case("correct") {
                Some(Verdict::Correct)
            } else if word.eq_ignore_ascii_case("incorrect") {
                Some(Verdict::Incorrect)
            } else {
                None
            }
        })
        .unwrap_or(Verdict::Undetermined)
}
