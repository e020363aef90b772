//! TF-IDF vocabulary model.
//!
//! - vocabulary: terms longer than two characters, ranked by aggregate
//!   `Σ_d (1 + ln tf) * idf` descending, ties broken by the term itself;
//!   the top `max_features` get stable indices in rank order
//! - idf: `ln((N + 1) / (df + 1)) + 1`
//! - vectors: sublinear tf times idf at the term's index, padded to
//!   `max_features`, L2-normalized

use std::cmp::Ordering;
use std::collections::HashMap;

use kbrag_core::error::{Error, Result};
use kbrag_text::tokenize;

const MIN_TERM_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct TfIdfModel {
    dim: usize,
    vocabulary: Vec<String>,
    idf: Vec<f32>,
    index: HashMap<String, usize>,
}

impl TfIdfModel {
    pub fn fit(corpus: &[String], max_features: usize) -> Self {
        let n = corpus.len() as f64;
        let docs: Vec<HashMap<String, u32>> = corpus.iter().map(|d| term_counts(d)).collect();

        let mut df: HashMap<&str, u32> = HashMap::new();
        for counts in &docs {
            for term in counts.keys() {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }
        let idf_of = |term: &str| -> f64 {
            let d = df.get(term).copied().unwrap_or(0) as f64;
            ((n + 1.0) / (d + 1.0)).ln() + 1.0
        };

        let mut aggregate: HashMap<&str, f64> = HashMap::new();
        for counts in &docs {
            for (term, &tf) in counts {
                *aggregate.entry(term.as_str()).or_insert(0.0) += (1.0 + (tf as f64).ln()) * idf_of(term);
            }
        }

        let mut ranked: Vec<(&str, f64)> = aggregate.into_iter().collect();
        ranked.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        });
        ranked.truncate(max_features);

        let vocabulary: Vec<String> = ranked.iter().map(|(t, _)| (*t).to_string()).collect();
        let idf: Vec<f32> = ranked.iter().map(|(t, _)| idf_of(t) as f32).collect();
        Self::build(max_features, vocabulary, idf)
    }

    /// Rebuild a model from persisted parts.
    pub fn from_parts(dim: usize, vocabulary: Vec<String>, idf: Vec<f32>) -> Result<Self> {
        if vocabulary.len() != idf.len() {
            return Err(Error::DimensionMismatch { expected: vocabulary.len(), actual: idf.len() });
        }
        if vocabulary.len() > dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: vocabulary.len() });
        }
        Ok(Self::build(dim, vocabulary, idf))
    }

    fn build(dim: usize, vocabulary: Vec<String>, idf: Vec<f32>) -> Self {
        let index = vocabulary.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();
        Self { dim, vocabulary, idf, index }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (term, tf) in term_counts(text) {
            if let Some(i) = self.index_of(&term) {
                v[i] = (1.0 + (tf as f32).ln()) * self.idf[i];
            }
        }
        // index order keeps the norm, and so every vector, bit-reproducible
        let norm = v.iter().fold(0f32, |acc, x| acc + x * x).sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for term in tokenize(text) {
        if term.chars().count() >= MIN_TERM_CHARS {
            *counts.entry(term).or_insert(0) += 1;
        }
    }
    counts
}
