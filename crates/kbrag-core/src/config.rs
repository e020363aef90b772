//! Configuration loader, typed RAG settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RAG__SEARCH__SEMANTIC_WEIGHT`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DocumentPurpose;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load `config.toml` and the environment overlay from `base`.
    pub fn load_from(base: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(base.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::config(format!("Failed to get '{}': {}", key, e)))
    }

    /// Typed `[rag]` section. Missing sections fall back to defaults; the
    /// result is validated before it is returned.
    pub fn rag_settings(&self) -> Result<RagSettings> {
        let settings = match self.figment.extract_inner::<RagSettings>("rag") {
            Ok(s) => s,
            Err(e) if e.missing() => RagSettings::default(),
            Err(e) => return Err(e.into()),
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub boost: BoostConfig,
    pub ingest: IngestConfig,
}

impl RagSettings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.embedding.validate()?;
        self.search.validate()?;
        self.boost.validate()
    }
}

/// Chunk sizes are counted in whitespace-delimited words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub target_chunk_size: usize,
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_chunk_size: 400, max_chunk_size: 600, min_chunk_size: 100, overlap_tokens: 50 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_chunk_size == 0 {
            return Err(Error::config("chunking.min_chunk_size must be positive"));
        }
        if !(self.min_chunk_size <= self.target_chunk_size && self.target_chunk_size <= self.max_chunk_size) {
            return Err(Error::config(format!(
                "chunking sizes must satisfy min <= target <= max (got {} / {} / {})",
                self.min_chunk_size, self.target_chunk_size, self.max_chunk_size
            )));
        }
        // Progress between chunks requires the overlap to be smaller than the floor.
        if self.overlap_tokens >= self.min_chunk_size {
            return Err(Error::config(format!(
                "chunking.overlap_tokens ({}) must be smaller than min_chunk_size ({})",
                self.overlap_tokens, self.min_chunk_size
            )));
        }
        // Any remainder above the ceiling must split into two legal chunks.
        if self.max_chunk_size + self.overlap_tokens < 2 * self.min_chunk_size {
            return Err(Error::config(format!(
                "chunking.max_chunk_size ({}) must be at least 2 * min_chunk_size - overlap_tokens ({})",
                self.max_chunk_size,
                2 * self.min_chunk_size - self.overlap_tokens
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub max_features: usize,
    pub cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { max_features: 1500, cache_size: 100 }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(Error::config("embedding.max_features must be positive"));
        }
        if self.cache_size == 0 {
            return Err(Error::config("embedding.cache_size must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub semantic_weight: f32,
    pub bm25_k1: f32,
    pub bm25_b: f32,
    pub default_top_k: usize,
    pub default_min_score: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { semantic_weight: 0.6, bm25_k1: 1.5, bm25_b: 0.75, default_top_k: 5, default_min_score: 0.25 }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.semantic_weight) {
            return Err(Error::config("search.semantic_weight must be within [0, 1]"));
        }
        if self.bm25_k1 <= 0.0 {
            return Err(Error::config("search.bm25_k1 must be positive"));
        }
        if !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(Error::config("search.bm25_b must be within [0, 1]"));
        }
        Ok(())
    }
}

/// Central document-purpose multiplier table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurposeWeights {
    pub definitive: f32,
    pub guidance: f32,
    pub reference: f32,
    pub procedural: f32,
    pub template: f32,
    pub example: f32,
}

impl Default for PurposeWeights {
    fn default() -> Self {
        Self { definitive: 1.3, guidance: 1.15, reference: 1.0, procedural: 0.95, template: 0.85, example: 0.85 }
    }
}

impl PurposeWeights {
    pub fn multiplier(&self, purpose: DocumentPurpose) -> f32 {
        match purpose {
            DocumentPurpose::Definitive => self.definitive,
            DocumentPurpose::Guidance => self.guidance,
            DocumentPurpose::Reference => self.reference,
            DocumentPurpose::Procedural => self.procedural,
            DocumentPurpose::Template => self.template,
            DocumentPurpose::Example => self.example,
        }
    }

    pub fn min(&self) -> f32 {
        [self.definitive, self.guidance, self.reference, self.procedural, self.template, self.example]
            .into_iter()
            .fold(f32::INFINITY, f32::min)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostConfig {
    pub purpose: PurposeWeights,
    pub deprioritized_penalty: f32,
    pub benchmark_boost: f32,
    pub exact_match_boost: f32,
    pub synonym_match_boost: f32,
    /// Query words that signal a numeric/benchmark lookup.
    pub benchmark_intent_terms: Vec<String>,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            purpose: PurposeWeights::default(),
            deprioritized_penalty: 0.5,
            benchmark_boost: 2.0,
            exact_match_boost: 1.5,
            synonym_match_boost: 1.2,
            benchmark_intent_terms: [
                "benchmark", "benchmarks", "typical", "average", "median", "range", "rate", "rates", "cost",
                "cpm", "cpc", "cpa", "ctr", "cvr", "roas", "roi",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl BoostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.purpose.min() <= 0.0 {
            return Err(Error::config("boost.purpose multipliers must be positive"));
        }
        if !(self.deprioritized_penalty > 0.0 && self.deprioritized_penalty < 1.0) {
            return Err(Error::config("boost.deprioritized_penalty must be within (0, 1)"));
        }
        // A deprioritized chunk must stay below every non-deprioritized peer.
        if self.deprioritized_penalty >= self.purpose.min() {
            return Err(Error::config(format!(
                "boost.deprioritized_penalty ({}) must be below the smallest purpose multiplier ({})",
                self.deprioritized_penalty,
                self.purpose.min()
            )));
        }
        if self.benchmark_boost < 1.0 || self.exact_match_boost < 1.0 || self.synonym_match_boost < 1.0 {
            return Err(Error::config("boost multipliers must be >= 1.0"));
        }
        if self.synonym_match_boost >= self.exact_match_boost {
            return Err(Error::config("boost.synonym_match_boost must be smaller than exact_match_boost"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// File extensions (without dot) picked up from the KB directory.
    pub extensions: Vec<String>,
    /// Directory for persisted index snapshots; `None` disables persistence.
    pub snapshot_dir: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { extensions: vec!["md".to_string(), "txt".to_string()], snapshot_dir: None }
    }
}

impl IngestConfig {
    pub fn accepts(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
