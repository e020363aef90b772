//! Embedding service: owns the fitted TF-IDF model and the query cache.

use tracing::{debug, info};

use kbrag_core::config::EmbeddingConfig;
use kbrag_core::error::{Error, Result};
use kbrag_core::traits::EmbeddingProvider;

use crate::cache::QueryCache;
use crate::model::TfIdfModel;

#[derive(Debug)]
pub struct EmbeddingService {
    config: EmbeddingConfig,
    model: Option<TfIdfModel>,
    cache: QueryCache,
}

impl EmbeddingService {
    pub fn new(config: EmbeddingConfig) -> Self {
        let cache = QueryCache::new(config.cache_size);
        Self { config, model: None, cache }
    }

    /// Wrap a model restored from a snapshot.
    pub fn from_model(config: EmbeddingConfig, model: TfIdfModel) -> Result<Self> {
        if model.dim() != config.max_features {
            return Err(Error::DimensionMismatch { expected: config.max_features, actual: model.dim() });
        }
        let cache = QueryCache::new(config.cache_size);
        Ok(Self { config, model: Some(model), cache })
    }

    /// Fit the vocabulary on `corpus`. Replaces any earlier model and drops
    /// cached query vectors built from it.
    pub fn initialize(&mut self, corpus: &[String]) {
        let model = TfIdfModel::fit(corpus, self.config.max_features);
        info!(documents = corpus.len(), vocabulary = model.vocabulary().len(), "embedding model fitted");
        self.model = Some(model);
        self.cache.clear();
    }

    pub fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Result<&TfIdfModel> {
        self.model
            .as_ref()
            .ok_or_else(|| Error::uninitialized("embedding service used before initialize"))
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.model()?.vectorize(text))
    }

    /// Embed a query, going through the LRU cache.
    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model()?;
        let key = QueryCache::key(text);
        if let Some(hit) = self.cache.get(&key) {
            debug!(query = %key, "query embedding cache hit");
            return Ok(hit);
        }
        let v = model.vectorize(&key);
        self.cache.put(key, v.clone());
        Ok(v)
    }
}

impl EmbeddingProvider for EmbeddingService {
    fn dim(&self) -> usize {
        self.config.max_features
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.model()?;
        Ok(texts.iter().map(|t| model.vectorize(t)).collect())
    }
}
