//! Tool-facing API: the two functions agents call, shaped for prompt
//! injection and never failing outward.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::fmt;
use tracing::warn;

use kbrag_core::error::Result;
use kbrag_core::traits::KnowledgeSearch;
use kbrag_core::types::{DocumentType, MetadataFilter, RetrieveOptions, SearchResult};

pub const NO_CITATION: &str = "No citation available.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    pub citation: String,
    pub content: String,
    pub score: f32,
    pub document_type: DocumentType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KnowledgeBaseResponse {
    pub snippets: Vec<Snippet>,
}

impl KnowledgeBaseResponse {
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

impl fmt::Display for KnowledgeBaseResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.snippets.is_empty() {
            return f.write_str(NO_CITATION);
        }
        for (i, s) in self.snippets.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            write!(f, "[{}] {}\n{}", i + 1, s.citation, s.content.trim())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkAnswer {
    pub kpi: String,
    pub value: String,
    /// Vertical the answer was found under; `None` after falling back to
    /// all verticals.
    pub vertical: Option<String>,
    pub confidence: Confidence,
    pub citation: String,
    /// The source line the value was taken from.
    pub excerpt: String,
}

pub struct KnowledgeTools {
    value: Regex,
}

impl KnowledgeTools {
    pub fn new() -> Result<Self> {
        Ok(Self {
            value: Regex::new(
                r"[$€£]?\d+(?:[.,]\d+)?\s?%?(?:\s?(?:-|–|to)\s?[$€£]?\d+(?:[.,]\d+)?\s?%?)?",
            )?,
        })
    }

    /// Ranked snippets with citations. Failures degrade to an empty
    /// response, which renders as `NO_CITATION`.
    pub fn search_knowledge_base(
        &self,
        search: &dyn KnowledgeSearch,
        query: &str,
        filters: Option<MetadataFilter>,
    ) -> KnowledgeBaseResponse {
        let options = RetrieveOptions { filters, ..Default::default() };
        match search.retrieve(query, &options) {
            Ok(results) => KnowledgeBaseResponse { snippets: results.iter().map(snippet).collect() },
            Err(e) => {
                warn!(error = %e, "knowledge base search failed");
                KnowledgeBaseResponse::default()
            }
        }
    }

    /// Look up a benchmark value among benchmark documents, preferring
    /// `vertical` and falling back to every vertical.
    pub fn get_benchmark(
        &self,
        search: &dyn KnowledgeSearch,
        vertical: &str,
        channel: &str,
        kpi: &str,
    ) -> Option<BenchmarkAnswer> {
        let kpi = kpi.trim();
        if kpi.is_empty() {
            return None;
        }
        let kpi_re = RegexBuilder::new(&regex::escape(kpi)).case_insensitive(true).build().ok()?;
        let query = format!("{kpi} {channel} {vertical} benchmark");
        let vertical = vertical.trim();

        let mut attempts: Vec<Option<&str>> = Vec::with_capacity(2);
        if !vertical.is_empty() {
            attempts.push(Some(vertical));
        }
        attempts.push(None);

        for scope in attempts {
            let filter = MetadataFilter {
                document_types: vec![DocumentType::Benchmark],
                verticals: scope.map(|v| vec![v.to_string()]).unwrap_or_default(),
                ..Default::default()
            };
            let options = RetrieveOptions { top_k: 10, min_score: 0.0, filters: Some(filter), include_context: false };
            let results = match search.retrieve(&query, &options) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "benchmark lookup failed");
                    return None;
                }
            };
            for r in &results {
                if let Some((value, excerpt)) = self.extract(&r.chunk.content, &kpi_re) {
                    let channel_hit = mentions(&r.chunk.content, channel);
                    let confidence = match (scope.is_some(), channel_hit) {
                        (true, true) => Confidence::High,
                        (true, false) | (false, true) => Confidence::Medium,
                        (false, false) => Confidence::Low,
                    };
                    return Some(BenchmarkAnswer {
                        kpi: kpi.to_string(),
                        value,
                        vertical: scope.map(|v| canonical_vertical(r, v)),
                        confidence,
                        citation: r.chunk.citation(),
                        excerpt,
                    });
                }
            }
        }
        None
    }

    /// First value on a line that names the KPI, preferring text after it.
    fn extract(&self, content: &str, kpi: &Regex) -> Option<(String, String)> {
        content.lines().find_map(|line| {
            let m = kpi.find(line)?;
            let value = self.value.find(&line[m.end()..]).or_else(|| self.value.find(line))?;
            Some((value.as_str().trim().to_string(), line.trim().to_string()))
        })
    }
}

fn snippet(r: &SearchResult) -> Snippet {
    Snippet {
        citation: r.chunk.citation(),
        content: r.context.clone().unwrap_or_else(|| r.chunk.content.clone()),
        score: r.score,
        document_type: r.chunk.metadata.document_type,
    }
}

fn mentions(content: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    !needle.is_empty() && content.to_lowercase().contains(&needle)
}

/// The vertical as configured on the chunk, whatever case it was asked in.
fn canonical_vertical(r: &SearchResult, requested: &str) -> String {
    r.chunk
        .metadata
        .verticals
        .iter()
        .find(|v| v.eq_ignore_ascii_case(requested))
        .cloned()
        .unwrap_or_else(|| requested.to_string())
}
