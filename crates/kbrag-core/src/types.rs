//! Domain types shared by the chunker, keyword index, vector store and
//! retrieval engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;

/// Broad classification of a KB document. Declaration order is the
/// precedence used when several pattern tables match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Benchmark,
    Framework,
    Playbook,
    Methodology,
    Guide,
    Reference,
    Template,
    General,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Benchmark => "benchmark",
            Self::Framework => "framework",
            Self::Playbook => "playbook",
            Self::Methodology => "methodology",
            Self::Guide => "guide",
            Self::Reference => "reference",
            Self::Template => "template",
            Self::General => "general",
        }
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "benchmark" => Ok(Self::Benchmark),
            "framework" => Ok(Self::Framework),
            "playbook" => Ok(Self::Playbook),
            "methodology" => Ok(Self::Methodology),
            "guide" => Ok(Self::Guide),
            "reference" => Ok(Self::Reference),
            "template" => Ok(Self::Template),
            "general" => Ok(Self::General),
            other => Err(Error::config(format!("unknown document type '{other}'"))),
        }
    }
}

/// What a document is for. Declaration order is both the resolution
/// priority and the order of the central boost table (strongest first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentPurpose {
    Definitive,
    Guidance,
    #[default]
    Reference,
    Procedural,
    Template,
    Example,
}

impl FromStr for DocumentPurpose {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "definitive" => Ok(Self::Definitive),
            "guidance" => Ok(Self::Guidance),
            "reference" => Ok(Self::Reference),
            "procedural" => Ok(Self::Procedural),
            "template" => Ok(Self::Template),
            "example" => Ok(Self::Example),
            other => Err(Error::config(format!("unknown document purpose '{other}'"))),
        }
    }
}

/// Structured tags extracted for every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_type: DocumentType,
    pub topics: BTreeSet<String>,
    pub steps: BTreeSet<u32>,
    pub has_numbers: bool,
    pub has_benchmarks: bool,
    pub verticals: BTreeSet<String>,
    pub metrics: BTreeSet<String>,
    pub document_purpose: DocumentPurpose,
    pub is_deprioritized: bool,
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self {
            document_type: DocumentType::General,
            topics: BTreeSet::new(),
            steps: BTreeSet::new(),
            has_numbers: false,
            has_benchmarks: false,
            verticals: BTreeSet::new(),
            metrics: BTreeSet::new(),
            document_purpose: DocumentPurpose::default(),
            is_deprioritized: false,
        }
    }
}

/// A contiguous span of a source document that is independently indexed.
///
/// - `id`: `"{filename}:{chunk_index}"`
/// - `filename`: path of the source relative to the KB root
/// - `section_title`: nearest preceding heading, or the file stem
/// - `content`: exactly `document[start_char..end_char]` (byte offsets)
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub filename: String,
    pub section_title: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Citation text used by the tool-facing API.
    pub fn citation(&self) -> String {
        format!("{} > {}", self.filename, self.section_title)
    }
}

/// A chunk plus its embedding, as held by the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

/// Indicates which scoring path produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RetrievalMethod {
    Semantic,
    Keyword,
    Hybrid,
}

/// Components that make up `SearchResult::score`.
///
/// Hybrid: `(w * semantic + (1 - w) * keyword) * metadata_boost`, with both
/// similarity components max-normalized over the candidate set.
/// Semantic-only and keyword-only results carry the raw similarity in their
/// component and `0.0` in the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f32,
    pub keyword: f32,
    pub metadata_boost: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
    pub method: RetrievalMethod,
    /// Content widened with the adjacent chunks, filled only when requested.
    pub context: Option<String>,
}

/// Pre-filter applied before scoring. Fields are AND-combined; a list field
/// is satisfied when the chunk carries any of its values; empty lists and
/// `false` impose no constraint. Verticals compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataFilter {
    pub document_types: Vec<DocumentType>,
    pub topics: Vec<String>,
    pub steps: Vec<u32>,
    pub must_have_benchmarks: bool,
    pub verticals: Vec<String>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.document_types.is_empty()
            && self.topics.is_empty()
            && self.steps.is_empty()
            && !self.must_have_benchmarks
            && self.verticals.is_empty()
    }

    pub fn matches(&self, meta: &ChunkMetadata) -> bool {
        if !self.document_types.is_empty() && !self.document_types.contains(&meta.document_type) {
            return false;
        }
        if !self.topics.is_empty() && !self.topics.iter().any(|t| meta.topics.contains(t)) {
            return false;
        }
        if !self.steps.is_empty() && !self.steps.iter().any(|s| meta.steps.contains(s)) {
            return false;
        }
        if self.must_have_benchmarks && !meta.has_benchmarks {
            return false;
        }
        if !self.verticals.is_empty()
            && !self.verticals.iter().any(|v| meta.verticals.iter().any(|m| m.eq_ignore_ascii_case(v.trim())))
        {
            return false;
        }
        true
    }
}

/// An analyzed query: the normalized original text, its literal terms and
/// the terms added only through synonym expansion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTerms {
    pub text: String,
    pub literal: Vec<String>,
    pub expanded: Vec<String>,
}

impl QueryTerms {
    pub fn new(text: impl Into<String>, literal: Vec<String>) -> Self {
        Self { text: text.into(), literal, expanded: Vec::new() }
    }

    /// Literal terms followed by expansion terms, without duplicates.
    pub fn all_terms(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.literal.len() + self.expanded.len());
        for term in self.literal.iter().chain(self.expanded.iter()) {
            if !out.contains(term) {
                out.push(term.clone());
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieveOptions {
    pub top_k: usize,
    pub min_score: f32,
    pub filters: Option<MetadataFilter>,
    pub include_context: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self { top_k: 5, min_score: 0.25, filters: None, include_context: false }
    }
}

/// A KB file that could not be ingested. Non-fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionWarning {
    pub path: String,
    pub reason: String,
}

/// Where the published index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionSource {
    Fresh,
    Snapshot,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub documents_seen: usize,
    pub documents_indexed: usize,
    pub documents_excluded: usize,
    pub documents_skipped: usize,
    pub chunks: usize,
    pub warnings: Vec<IngestionWarning>,
    pub fingerprint: String,
    pub source: IngestionSource,
}
