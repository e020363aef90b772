//! Metadata-aware re-ranking multiplier.
//!
//! `boost = purpose * [benchmark] * [exact | synonym]`, where each bracketed
//! factor applies at most once. Deprioritized chunks get
//! `min(purpose, 1) * penalty` instead, which validation keeps below every
//! purpose multiplier.

use std::collections::HashSet;

use kbrag_core::chunker::NumericPatterns;
use kbrag_core::config::BoostConfig;
use kbrag_core::error::Result;
use kbrag_core::traits::ScoreBooster;
use kbrag_core::types::{DocumentChunk, QueryTerms};
use kbrag_text::tokenize;

#[derive(Debug, Clone)]
pub struct MetadataBooster {
    config: BoostConfig,
    patterns: NumericPatterns,
    intent_terms: Vec<Vec<String>>,
}

impl MetadataBooster {
    pub fn new(config: BoostConfig) -> Result<Self> {
        config.validate()?;
        let intent_terms = config
            .benchmark_intent_terms
            .iter()
            .map(|t| tokenize(t))
            .filter(|t| !t.is_empty())
            .collect();
        Ok(Self { config, patterns: NumericPatterns::new()?, intent_terms })
    }

    pub fn config(&self) -> &BoostConfig {
        &self.config
    }

    /// Whether the query asks for numbers: it carries a currency amount,
    /// percentage or range, or uses one of the intent terms.
    pub fn has_benchmark_intent(&self, query: &QueryTerms) -> bool {
        self.patterns.has_benchmarks(&query.text)
            || self
                .intent_terms
                .iter()
                .any(|phrase| query.literal.windows(phrase.len()).any(|w| w == phrase.as_slice()))
    }
}

impl ScoreBooster for MetadataBooster {
    fn boost(&self, chunk: &DocumentChunk, query: &QueryTerms) -> f32 {
        let meta = &chunk.metadata;
        let purpose = self.config.purpose.multiplier(meta.document_purpose);
        if meta.is_deprioritized {
            return purpose.min(1.0) * self.config.deprioritized_penalty;
        }

        let mut m = purpose;
        if meta.has_benchmarks && self.has_benchmark_intent(query) {
            m *= self.config.benchmark_boost;
        }
        let words: HashSet<String> = tokenize(&chunk.content).into_iter().collect();
        if query.literal.iter().any(|t| words.contains(t)) {
            m *= self.config.exact_match_boost;
        } else if query.expanded.iter().any(|t| words.contains(t)) {
            m *= self.config.synonym_match_boost;
        }
        m
    }
}
