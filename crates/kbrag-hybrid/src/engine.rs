//! Retrieval engine for one agent.
//!
//! Ingestion builds a complete `SearchIndex` off to the side and publishes it
//! with a single pointer swap, so queries always see either the old index or
//! the new one. Queries clone the `Arc` under a short read lock and rank
//! without holding any lock.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use kbrag_core::agent::CompiledAgentConfig;
use kbrag_core::chunker::DocumentChunker;
use kbrag_core::config::{expand_path, RagSettings};
use kbrag_core::error::{Error, Result};
use kbrag_core::traits::{EmbeddingProvider, KnowledgeSearch, StorageProvider};
use kbrag_core::types::{
    DocumentChunk, IngestionSource, IngestionSummary, IngestionWarning, RetrieveOptions, SearchResult,
};
use kbrag_embed::EmbeddingService;
use kbrag_vector::{fingerprint, merge_context, RankRequest, VectorStore};

use crate::boost::MetadataBooster;
use crate::expansion::QueryExpander;

/// Everything a query needs, immutable once published.
struct SearchIndex {
    store: VectorStore,
    embeddings: EmbeddingService,
    summary: IngestionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub agent_id: String,
    pub initialized: bool,
    pub chunks: usize,
    pub fingerprint: Option<String>,
}

/// Documents read during one ingestion pass, keyed by KB-relative path.
struct Collected {
    documents: Vec<(String, String)>,
    seen: usize,
    excluded: usize,
    warnings: Vec<IngestionWarning>,
}

pub struct RetrievalEngine {
    agent: Arc<CompiledAgentConfig>,
    settings: RagSettings,
    storage: Arc<dyn StorageProvider>,
    chunker: DocumentChunker,
    expander: QueryExpander,
    booster: MetadataBooster,
    index: RwLock<Option<Arc<SearchIndex>>>,
    ingest: Mutex<()>,
}

impl RetrievalEngine {
    pub fn new(
        agent: Arc<CompiledAgentConfig>,
        settings: RagSettings,
        storage: Arc<dyn StorageProvider>,
    ) -> Result<Self> {
        settings.validate()?;
        let chunker = DocumentChunker::new(settings.chunking.clone())?;
        let booster = MetadataBooster::new(settings.boost.clone())?;
        let expander = QueryExpander::new(&agent);
        Ok(Self {
            agent,
            settings,
            storage,
            chunker,
            expander,
            booster,
            index: RwLock::new(None),
            ingest: Mutex::new(()),
        })
    }

    pub fn agent(&self) -> &CompiledAgentConfig {
        &self.agent
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Options filled from the configured search defaults.
    pub fn default_options(&self) -> RetrieveOptions {
        RetrieveOptions {
            top_k: self.settings.search.default_top_k,
            min_score: self.settings.search.default_min_score,
            ..Default::default()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.index.read().is_some()
    }

    pub fn status(&self) -> EngineStatus {
        let current = self.index.read().clone();
        EngineStatus {
            agent_id: self.agent.agent_id().to_string(),
            initialized: current.is_some(),
            chunks: current.as_ref().map_or(0, |ix| ix.store.len()),
            fingerprint: current.map(|ix| ix.summary.fingerprint.clone()),
        }
    }

    pub fn summary(&self) -> Option<IngestionSummary> {
        self.index.read().as_ref().map(|ix| ix.summary.clone())
    }

    /// Ingest the agent's KB and publish the result. Re-running on an
    /// unchanged KB keeps the published index.
    pub fn initialize(&self) -> Result<IngestionSummary> {
        let _guard = self.ingest.lock();
        let collected = self.collect()?;
        let fp = fingerprint(
            &collected.documents,
            &(&self.settings.chunking, &self.settings.embedding, self.agent.config()),
        )?;

        if let Some(current) = self.index.read().clone() {
            if current.summary.fingerprint == fp {
                debug!(agent = self.agent.agent_id(), "knowledge base unchanged");
                let mut summary = current.summary.clone();
                summary.source = IngestionSource::Unchanged;
                return Ok(summary);
            }
        }

        let snapshot = self.snapshot_path();
        if let Some(path) = &snapshot {
            match VectorStore::load(path, &fp, self.settings.search.clone()) {
                Ok(Some(loaded)) => {
                    let embeddings = EmbeddingService::from_model(self.settings.embedding.clone(), loaded.model)?;
                    let indexed: BTreeSet<&str> =
                        loaded.store.chunks().iter().map(|sc| sc.chunk.filename.as_str()).collect();
                    let summary =
                        summarize(&collected, indexed.len(), loaded.store.len(), fp, IngestionSource::Snapshot);
                    self.publish(loaded.store, embeddings, summary.clone());
                    return Ok(summary);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable snapshot, rebuilding"),
            }
        }

        let mut chunks: Vec<DocumentChunk> = Vec::new();
        let mut indexed = 0usize;
        for (filename, text) in &collected.documents {
            let doc_chunks = self.chunker.chunk(text, filename, &self.agent);
            if !doc_chunks.is_empty() {
                indexed += 1;
            }
            chunks.extend(doc_chunks);
        }

        let corpus: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut embeddings = EmbeddingService::new(self.settings.embedding.clone());
        embeddings.initialize(&corpus);
        let vectors = embeddings.embed_batch(&corpus)?;
        let mut store = VectorStore::new(embeddings.dim(), self.settings.search.clone());
        store.add_chunks(chunks, vectors)?;

        if let Some(path) = &snapshot {
            let model = embeddings.model()?;
            if let Err(e) = store.persist(path, &fp, model) {
                warn!(path = %path.display(), error = %e, "failed to write snapshot");
            }
        }

        let summary = summarize(&collected, indexed, store.len(), fp, IngestionSource::Fresh);
        self.publish(store, embeddings, summary.clone());
        Ok(summary)
    }

    fn collect(&self) -> Result<Collected> {
        let kb = Path::new(self.agent.kb_path());
        let mut collected = Collected { documents: Vec::new(), seen: 0, excluded: 0, warnings: Vec::new() };
        for path in self.storage.list_documents(kb)? {
            let rel = relative_name(kb, &path);
            if !self.settings.ingest.accepts(&rel) {
                continue;
            }
            collected.seen += 1;
            if self.agent.is_excluded(&rel) {
                collected.excluded += 1;
                continue;
            }
            match self.storage.read_document(&path) {
                Ok(text) => collected.documents.push((rel, text)),
                Err(e) => {
                    warn!(path = %rel, error = %e, "skipping document");
                    collected.warnings.push(IngestionWarning { path: rel, reason: e.to_string() });
                }
            }
        }
        Ok(collected)
    }

    fn snapshot_path(&self) -> Option<PathBuf> {
        let dir = self.settings.ingest.snapshot_dir.as_ref()?;
        let name = match self.agent.agent_id() {
            "" => "default",
            id => id,
        };
        Some(expand_path(dir).join(format!("{name}.snapshot")))
    }

    fn publish(&self, store: VectorStore, embeddings: EmbeddingService, summary: IngestionSummary) {
        info!(
            agent = self.agent.agent_id(),
            documents = summary.documents_indexed,
            excluded = summary.documents_excluded,
            skipped = summary.documents_skipped,
            chunks = summary.chunks,
            source = ?summary.source,
            "index published"
        );
        *self.index.write() = Some(Arc::new(SearchIndex { store, embeddings, summary }));
    }

    fn current(&self) -> Result<Arc<SearchIndex>> {
        self.index
            .read()
            .clone()
            .ok_or_else(|| Error::uninitialized(format!("retrieval engine '{}' is not initialized", self.agent.agent_id())))
    }

    pub fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("query is empty".to_string()));
        }
        let index = self.current()?;
        if index.store.is_empty() || options.top_k == 0 {
            return Ok(Vec::new());
        }

        let terms = self.expander.expand(query);
        let embedding = index.embeddings.embed_query(query)?;
        let filter = options.filters.as_ref().filter(|f| !f.is_empty());
        let mut results = index.store.rank(&RankRequest {
            query: &terms,
            embedding: &embedding,
            semantic_weight: self.settings.search.semantic_weight,
            filter,
            booster: Some(&self.booster),
            top_k: options.top_k,
        })?;
        // ranked lists are sorted, so cutting after truncation is equivalent
        results.retain(|r| r.score >= options.min_score);

        if options.include_context {
            for r in &mut results {
                r.context = Some(widen(&index.store, &r.chunk));
            }
        }
        debug!(
            agent = self.agent.agent_id(),
            literal = terms.literal.len(),
            expanded = terms.expanded.len(),
            results = results.len(),
            "retrieve"
        );
        Ok(results)
    }
}

impl KnowledgeSearch for RetrievalEngine {
    fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<Vec<SearchResult>> {
        RetrievalEngine::retrieve(self, query, options)
    }
}

/// The chunk merged with its immediate neighbors in the same document.
fn widen(store: &VectorStore, chunk: &DocumentChunk) -> String {
    let prev = chunk
        .chunk_index
        .checked_sub(1)
        .and_then(|i| store.neighbor(&chunk.filename, i));
    let next = store.neighbor(&chunk.filename, chunk.chunk_index + 1);
    let parts: Vec<&DocumentChunk> = prev.into_iter().chain(Some(chunk)).chain(next).collect();
    merge_context(&parts)
}

fn relative_name(kb: &Path, path: &Path) -> String {
    path.strip_prefix(kb)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn summarize(
    collected: &Collected,
    documents_indexed: usize,
    chunks: usize,
    fingerprint: String,
    source: IngestionSource,
) -> IngestionSummary {
    IngestionSummary {
        documents_seen: collected.seen,
        documents_indexed,
        documents_excluded: collected.excluded,
        documents_skipped: collected.warnings.len(),
        chunks,
        warnings: collected.warnings.clone(),
        fingerprint,
        source,
    }
}
