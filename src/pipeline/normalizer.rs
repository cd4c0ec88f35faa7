//! Stage normalization
//!
//! Maps free-text stage labels onto a funnel's canonical keys by running the
//! funnel's declared rewrite cascade.
//!
//! # Fail-open default
//!
//! A label that does not end up on a canonical key is **not** an error: it is
//! silently mapped to the funnel's first stage. This keeps boards usable with
//! dirty upstream data, but it also hides data-quality problems. Every
//! defaulted label is logged at `debug` level with its original text.

use crate::pipeline::funnel::Funnel;
use crate::pipeline::types::PipelineRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s_]+").expect("separator pattern is valid"));

/// Normalizes stage labels against a funnel
pub struct StageNormalizer;

impl StageNormalizer {
    /// Lower-case the label and join words with single hyphens
    pub fn prepare(raw: &str) -> String {
        SEPARATORS
            .replace_all(raw.trim(), "-")
            .to_lowercase()
    }

    /// Run the cascade and return the working string without the default step
    pub fn rewrite(funnel: &Funnel, raw: &str) -> String {
        let mut working = Self::prepare(raw);

        for rule in &funnel.rules {
            // A canonical key is final; later rules must not rewrite it again
            if funnel.contains(&working) {
                break;
            }
            if working.contains(rule.term) {
                working = working.replacen(rule.term, rule.target, 1);
            }
        }

        working
    }

    /// Canonical key for `raw`, or the funnel's first stage when the cascade
    /// does not land on one. Returns an empty key only for an empty funnel.
    pub fn normalize(funnel: &Funnel, raw: &str) -> &'static str {
        let rewritten = Self::rewrite(funnel, raw);

        if let Some(stage) = funnel.stage(&rewritten) {
            return stage.key;
        }

        let fallback = funnel.first().unwrap_or_default();
        debug!(
            funnel = funnel.name,
            raw_stage = raw,
            rewritten = %rewritten,
            fallback,
            "Unrecognized stage label, using first stage"
        );
        fallback
    }

    /// Fill `canonical_stage` on every record from its raw label
    pub fn normalize_records(funnel: &Funnel, records: &mut [PipelineRecord]) {
        for record in records.iter_mut() {
            record.canonical_stage = Self::normalize(funnel, &record.raw_stage).to_string();
        }
    }
}
