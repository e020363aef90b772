use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{DocumentChunk, QueryTerms, RetrieveOptions, SearchResult};

/// Turns text into fixed-dimension vectors.
pub trait EmbeddingProvider: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Document source for ingestion and a sink for small JSON artifacts.
pub trait StorageProvider: Send + Sync {
    fn read_document(&self, path: &Path) -> Result<String>;
    fn write_document(&self, path: &Path, content: &str) -> Result<()>;
    /// Every document below `dir`, sorted by path.
    fn list_documents(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    fn exists(&self, path: &Path) -> bool;
}

/// Multiplicative re-ranking factor for one candidate. `1.0` is neutral.
pub trait ScoreBooster: Send + Sync {
    fn boost(&self, chunk: &DocumentChunk, query: &QueryTerms) -> f32;
}

pub trait KnowledgeSearch: Send + Sync {
    fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<Vec<SearchResult>>;
}
