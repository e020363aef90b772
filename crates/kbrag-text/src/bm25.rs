//! In-memory BM25 keyword index.
//!
//! Documents are addressed by insertion position, which the vector store
//! keeps aligned with its own chunk positions.

use std::collections::{HashMap, HashSet};

use kbrag_core::config::SearchConfig;

use crate::analysis::tokenize;

#[derive(Debug, Clone)]
struct DocStats {
    len: usize,
    tf: HashMap<String, u32>,
}

#[derive(Debug, Clone)]
pub struct Bm25Index {
    k1: f32,
    b: f32,
    docs: Vec<DocStats>,
    df: HashMap<String, usize>,
    total_len: usize,
}

impl Bm25Index {
    pub fn new(k1: f32, b: f32) -> Self {
        Self { k1, b, docs: Vec::new(), df: HashMap::new(), total_len: 0 }
    }

    pub fn from_config(cfg: &SearchConfig) -> Self {
        Self::new(cfg.bm25_k1, cfg.bm25_b)
    }

    /// Index one document and return its position.
    pub fn add(&mut self, text: &str) -> usize {
        let terms = tokenize(text);
        let mut tf: HashMap<String, u32> = HashMap::new();
        for t in &terms {
            *tf.entry(t.clone()).or_insert(0) += 1;
        }
        for t in tf.keys() {
            *self.df.entry(t.clone()).or_insert(0) += 1;
        }
        self.total_len += terms.len();
        self.docs.push(DocStats { len: terms.len(), tf });
        self.docs.len() - 1
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn avgdl(&self) -> f32 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_len as f32 / self.docs.len() as f32
        }
    }

    /// `ln(1 + (N - df + 0.5) / (df + 0.5))`, always positive.
    pub fn idf(&self, term: &str) -> f32 {
        let n = self.docs.len() as f32;
        let df = self.df.get(term).copied().unwrap_or(0) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    pub fn contains_term(&self, doc: usize, term: &str) -> bool {
        self.docs.get(doc).is_some_and(|d| d.tf.contains_key(term))
    }

    /// BM25 score of one document. Repeated query terms count once.
    pub fn score(&self, doc: usize, terms: &[String]) -> f32 {
        let Some(stats) = self.docs.get(doc) else {
            return 0.0;
        };
        let avgdl = self.avgdl();
        let mut seen = HashSet::new();
        let mut total = 0.0f32;
        for term in terms {
            if !seen.insert(term.as_str()) {
                continue;
            }
            let Some(&tf) = stats.tf.get(term) else {
                continue;
            };
            let tf = tf as f32;
            let norm = if avgdl > 0.0 { stats.len as f32 / avgdl } else { 0.0 };
            let denom = tf + self.k1 * (1.0 - self.b + self.b * norm);
            total += self.idf(term) * tf * (self.k1 + 1.0) / denom;
        }
        total
    }

    /// Score for every document, in position order.
    pub fn scores(&self, terms: &[String]) -> Vec<f32> {
        (0..self.docs.len()).map(|d| self.score(d, terms)).collect()
    }

    /// Positive-scoring documents, best first; ties keep position order.
    pub fn search(&self, terms: &[String], top_k: usize) -> Vec<(usize, f32)> {
        let mut hits: Vec<(usize, f32)> = self
            .scores(terms)
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(top_k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(q: &str) -> Vec<String> {
        tokenize(q)
    }

    fn index() -> Bm25Index {
        let mut idx = Bm25Index::new(1.5, 0.75);
        idx.add("CPM benchmark for retail display campaigns");
        idx.add("Audience targeting guide for retail brands");
        idx.add("Measurement framework and attribution");
        idx
    }

    #[test]
    fn rarer_terms_weigh_more() {
        let idx = index();
        assert!(idx.idf("cpm") > idx.idf("retail"));
        assert!(idx.idf("unseen") > idx.idf("cpm"));
    }

    #[test]
    fn search_ranks_matching_documents() {
        let idx = index();
        let hits = idx.search(&terms("retail cpm"), 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 1);
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn duplicate_query_terms_count_once() {
        let idx = index();
        let once = idx.score(0, &terms("cpm"));
        let twice = idx.score(0, &terms("cpm cpm"));
        assert!((once - twice).abs() < 1e-6);
    }

    #[test]
    fn no_match_means_no_hit() {
        let idx = index();
        assert!(idx.search(&terms("podcast"), 5).is_empty());
        assert!(!idx.contains_term(2, "cpm"));
        assert!(idx.contains_term(0, "cpm"));
        assert_eq!(idx.score(99, &terms("cpm")), 0.0);
    }
}
