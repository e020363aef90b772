use std::collections::HashMap;
use tracing::debug;

use kbrag_core::config::SearchConfig;
use kbrag_core::error::{Error, Result};
use kbrag_core::traits::ScoreBooster;
use kbrag_core::types::{
    DocumentChunk, MetadataFilter, QueryTerms, RetrievalMethod, ScoreBreakdown, SearchResult, StoredChunk,
};
use kbrag_text::{tokenize, Bm25Index};

/// Parameters for one hybrid ranking pass.
pub struct RankRequest<'a> {
    /// Literal terms drive exact-match boosts; `all_terms()` feeds BM25.
    pub query: &'a QueryTerms,
    pub embedding: &'a [f32],
    pub semantic_weight: f32,
    pub filter: Option<&'a MetadataFilter>,
    pub booster: Option<&'a dyn ScoreBooster>,
    pub top_k: usize,
}

/// A booster together with the analyzed query it scores against, for the
/// single-signal searches.
#[derive(Clone, Copy)]
pub struct Boost<'a> {
    pub booster: &'a dyn ScoreBooster,
    pub query: &'a QueryTerms,
}

/// Append-only store of embedded chunks. Positions in `chunks` and in the
/// BM25 index always agree.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dim: usize,
    search: SearchConfig,
    chunks: Vec<StoredChunk>,
    keyword: Bm25Index,
    positions: HashMap<(String, usize), usize>,
}

impl VectorStore {
    pub fn new(dim: usize, search: SearchConfig) -> Self {
        let keyword = Bm25Index::from_config(&search);
        Self { dim, search, chunks: Vec::new(), keyword, positions: HashMap::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[StoredChunk] {
        &self.chunks
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// Append chunks with their embeddings. Nothing is stored unless every
    /// embedding has the store's dimension.
    pub fn add_chunks(&mut self, chunks: Vec<DocumentChunk>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(Error::Operation(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: bad.len() });
        }
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            let pos = self.keyword.add(&chunk.content);
            self.positions.insert((chunk.filename.clone(), chunk.chunk_index), pos);
            self.chunks.push(StoredChunk { chunk, embedding });
        }
        Ok(())
    }

    /// Chunk `chunk_index` of `filename`, if stored.
    pub fn neighbor(&self, filename: &str, chunk_index: usize) -> Option<&DocumentChunk> {
        self.positions
            .get(&(filename.to_string(), chunk_index))
            .map(|&pos| &self.chunks[pos].chunk)
    }

    /// Dot-product similarity against every chunk, best first. With a
    /// `boost` the similarity is multiplied by the chunk's boost before
    /// sorting and truncation.
    pub fn search_semantic(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        boost: Option<Boost<'_>>,
    ) -> Result<Vec<SearchResult>> {
        self.check_dim(query_embedding)?;
        let mut out: Vec<SearchResult> = self
            .chunks
            .iter()
            .map(|sc| {
                let sim = dot(query_embedding, &sc.embedding);
                let metadata_boost = boost_for(boost, &sc.chunk);
                let breakdown = ScoreBreakdown { semantic: sim, keyword: 0.0, metadata_boost };
                result(&sc.chunk, sim * metadata_boost, breakdown, RetrievalMethod::Semantic)
            })
            .collect();
        sort_desc(&mut out);
        out.truncate(top_k);
        Ok(out)
    }

    /// BM25 over the tokenized query. Chunks without any query term are
    /// left out. Boosting works as in `search_semantic`.
    pub fn search_keyword(&self, query: &str, top_k: usize, boost: Option<Boost<'_>>) -> Vec<SearchResult> {
        self.search_keyword_terms(&tokenize(query), top_k, boost)
    }

    pub fn search_keyword_terms(&self, terms: &[String], top_k: usize, boost: Option<Boost<'_>>) -> Vec<SearchResult> {
        let hits = match boost {
            Some(_) => self.keyword.search(terms, self.chunks.len()),
            None => self.keyword.search(terms, top_k),
        };
        let mut out: Vec<SearchResult> = hits
            .into_iter()
            .map(|(pos, score)| {
                let chunk = &self.chunks[pos].chunk;
                let metadata_boost = boost_for(boost, chunk);
                let breakdown = ScoreBreakdown { semantic: 0.0, keyword: score, metadata_boost };
                result(chunk, score * metadata_boost, breakdown, RetrievalMethod::Keyword)
            })
            .collect();
        sort_desc(&mut out);
        out.truncate(top_k);
        out
    }

    pub fn search_hybrid(
        &self,
        query: &str,
        query_embedding: &[f32],
        top_k: usize,
        semantic_weight: f32,
    ) -> Result<Vec<SearchResult>> {
        let terms = QueryTerms::new(query, tokenize(query));
        self.rank(&RankRequest {
            query: &terms,
            embedding: query_embedding,
            semantic_weight,
            filter: None,
            booster: None,
            top_k,
        })
    }

    /// Hybrid search restricted to chunks that satisfy `filter`.
    pub fn search_filtered(
        &self,
        query: &str,
        query_embedding: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let terms = QueryTerms::new(query, tokenize(query));
        self.rank(&RankRequest {
            query: &terms,
            embedding: query_embedding,
            semantic_weight: self.search.semantic_weight,
            filter: Some(filter),
            booster: None,
            top_k,
        })
    }

    /// Filter, score, blend, boost, sort, truncate.
    ///
    /// Both similarity components are divided by their maximum over the
    /// candidate set before blending. Negative cosines count as zero and a
    /// candidate with neither signal is dropped.
    pub fn rank(&self, req: &RankRequest<'_>) -> Result<Vec<SearchResult>> {
        self.check_dim(req.embedding)?;
        let terms = req.query.all_terms();

        let candidates: Vec<(usize, f32, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, sc)| req.filter.map_or(true, |f| f.matches(&sc.chunk.metadata)))
            .map(|(pos, sc)| {
                let sem = dot(req.embedding, &sc.embedding).max(0.0);
                let kw = self.keyword.score(pos, &terms);
                (pos, sem, kw)
            })
            .filter(|&(_, sem, kw)| sem > 0.0 || kw > 0.0)
            .collect();

        let max_sem = candidates.iter().fold(0f32, |m, c| m.max(c.1));
        let max_kw = candidates.iter().fold(0f32, |m, c| m.max(c.2));
        let w = req.semantic_weight;

        let mut out: Vec<SearchResult> = candidates
            .into_iter()
            .map(|(pos, sem, kw)| {
                let chunk = &self.chunks[pos].chunk;
                let semantic = if max_sem > 0.0 { sem / max_sem } else { 0.0 };
                let keyword = if max_kw > 0.0 { kw / max_kw } else { 0.0 };
                let metadata_boost = req.booster.map_or(1.0, |b| b.boost(chunk, req.query));
                let score = (w * semantic + (1.0 - w) * keyword) * metadata_boost;
                result(chunk, score, ScoreBreakdown { semantic, keyword, metadata_boost }, RetrievalMethod::Hybrid)
            })
            .collect();
        debug!(candidates = out.len(), top_k = req.top_k, "hybrid ranking");

        sort_desc(&mut out);
        out.truncate(req.top_k);
        Ok(out)
    }

    fn check_dim(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: v.len() });
        }
        Ok(())
    }
}

/// Join chunks of one document in `chunk_index` order, dropping the
/// overlap each one shares with its predecessor.
pub fn merge_context(chunks: &[&DocumentChunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for (i, c) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&c.content);
            covered = c.end_char;
            continue;
        }
        if c.end_char <= covered {
            continue;
        }
        let skip = covered.saturating_sub(c.start_char);
        if let Some(rest) = c.content.get(skip..) {
            out.push_str(rest);
            covered = c.end_char;
        }
    }
    out
}

fn boost_for(boost: Option<Boost<'_>>, chunk: &DocumentChunk) -> f32 {
    boost.map_or(1.0, |b| b.booster.boost(chunk, b.query))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn result(chunk: &DocumentChunk, score: f32, breakdown: ScoreBreakdown, method: RetrievalMethod) -> SearchResult {
    SearchResult { chunk: chunk.clone(), score, breakdown, method, context: None }
}

/// Stable: equal scores keep insertion order.
fn sort_desc(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(filename: &str, idx: usize, content: &str, start: usize) -> DocumentChunk {
        DocumentChunk {
            id: format!("{filename}:{idx}"),
            filename: filename.into(),
            section_title: "s".into(),
            content: content.into(),
            chunk_index: idx,
            total_chunks: 3,
            start_char: start,
            end_char: start + content.len(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn add_rejects_wrong_dimension_without_partial_insert() {
        let mut store = VectorStore::new(2, SearchConfig::default());
        let err = store
            .add_chunks(
                vec![chunk("a", 0, "x", 0), chunk("a", 1, "y", 1)],
                vec![vec![1.0, 0.0], vec![1.0]],
            )
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));
        assert!(store.is_empty());
    }

    #[test]
    fn add_rejects_length_mismatch() {
        let mut store = VectorStore::new(2, SearchConfig::default());
        assert!(store.add_chunks(vec![chunk("a", 0, "x", 0)], vec![]).is_err());
    }

    #[test]
    fn semantic_ties_keep_insertion_order() {
        let mut store = VectorStore::new(2, SearchConfig::default());
        store
            .add_chunks(
                vec![chunk("a", 0, "one", 0), chunk("b", 0, "two", 0), chunk("c", 0, "three", 0)],
                vec![vec![0.6, 0.8], vec![1.0, 0.0], vec![0.6, 0.8]],
            )
            .expect("add");
        let hits = store.search_semantic(&[0.6, 0.8], 3, None).expect("search");
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a:0", "c:0", "b:0"]);
    }

    #[test]
    fn merge_context_drops_overlap() {
        let text = "alpha beta gamma delta epsilon";
        let a = chunk("d", 0, &text[0..17], 0); // "alpha beta gamma "
        let b = chunk("d", 1, &text[11..], 11); // "gamma delta epsilon"
        assert_eq!(merge_context(&[&a, &b]), text);
        assert_eq!(merge_context(&[&a]), &text[0..17]);
    }

    #[test]
    fn neighbor_lookup() {
        let mut store = VectorStore::new(1, SearchConfig::default());
        store
            .add_chunks(vec![chunk("d", 0, "x", 0), chunk("d", 1, "y", 1)], vec![vec![1.0], vec![1.0]])
            .expect("add");
        assert_eq!(store.neighbor("d", 1).map(|c| c.content.as_str()), Some("y"));
        assert!(store.neighbor("d", 2).is_none());
    }
}
