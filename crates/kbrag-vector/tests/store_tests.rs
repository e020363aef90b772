use tempfile::TempDir;

use kbrag_core::config::{EmbeddingConfig, SearchConfig};
use kbrag_core::traits::{EmbeddingProvider, ScoreBooster};
use kbrag_core::types::{ChunkMetadata, DocumentChunk, DocumentType, MetadataFilter, QueryTerms};
use kbrag_embed::EmbeddingService;
use kbrag_text::tokenize;
use kbrag_vector::{Boost, RankRequest, VectorStore};

fn chunk(filename: &str, content: &str, doc_type: DocumentType, has_benchmarks: bool) -> DocumentChunk {
    DocumentChunk {
        id: format!("{filename}:0"),
        filename: filename.into(),
        section_title: filename.into(),
        content: content.into(),
        chunk_index: 0,
        total_chunks: 1,
        start_char: 0,
        end_char: content.len(),
        metadata: ChunkMetadata { document_type: doc_type, has_benchmarks, ..Default::default() },
    }
}

fn corpus() -> Vec<DocumentChunk> {
    vec![
        chunk("retail_benchmarks.txt", "CPM benchmark $8-15 for RETAIL display", DocumentType::Benchmark, true),
        chunk("guide.md", "Display advertising guide: creative sizes and CPM buying", DocumentType::Guide, false),
        chunk("audience.md", "Audience segmentation for retail loyalty programs", DocumentType::Guide, false),
        chunk("measurement.md", "Attribution and incrementality testing framework", DocumentType::Framework, false),
    ]
}

fn build(max_features: usize) -> (VectorStore, EmbeddingService) {
    let chunks = corpus();
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let mut service = EmbeddingService::new(EmbeddingConfig { max_features, cache_size: 10 });
    service.initialize(&texts);
    let embeddings = service.embed_batch(&texts).expect("embed");
    let mut store = VectorStore::new(max_features, SearchConfig::default());
    store.add_chunks(chunks, embeddings).expect("add");
    (store, service)
}

#[test]
fn hybrid_scores_are_non_increasing_and_normalized() {
    let (store, service) = build(256);
    let q = service.embed_query("display cpm").expect("q");
    let hits = store.search_hybrid("display cpm", &q, 10, 0.6).expect("hybrid");
    assert!(!hits.is_empty());
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    for h in &hits {
        assert!((0.0..=1.0).contains(&h.breakdown.semantic));
        assert!((0.0..=1.0).contains(&h.breakdown.keyword));
        assert!(h.score <= 1.0 + 1e-6);
    }
    // measurement.md shares nothing with the query
    assert!(hits.iter().all(|h| h.chunk.filename != "measurement.md"));
}

#[test]
fn keyword_search_returns_raw_bm25() {
    let (store, _) = build(256);
    let hits = store.search_keyword("retail", 10, None);
    let files: Vec<_> = hits.iter().map(|h| h.chunk.filename.as_str()).collect();
    assert_eq!(files.len(), 2);
    assert!(files.contains(&"retail_benchmarks.txt") && files.contains(&"audience.md"));
    assert!(hits.iter().all(|h| h.breakdown.semantic == 0.0 && h.score == h.breakdown.keyword));
}

#[test]
fn filtered_search_only_returns_matching_chunks() {
    let (store, service) = build(256);
    let q = service.embed_query("cpm").expect("q");
    let filter = MetadataFilter { document_types: vec![DocumentType::Benchmark], ..Default::default() };
    let hits = store.search_filtered("cpm", &q, &filter, 10).expect("filtered");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.filename, "retail_benchmarks.txt");

    let none = MetadataFilter { verticals: vec!["AUTOMOTIVE".into()], ..Default::default() };
    assert!(store.search_filtered("cpm", &q, &none, 10).expect("filtered").is_empty());
}

struct HalveGuides;

impl ScoreBooster for HalveGuides {
    fn boost(&self, chunk: &DocumentChunk, _query: &QueryTerms) -> f32 {
        if chunk.metadata.document_type == DocumentType::Guide {
            0.5
        } else {
            1.0
        }
    }
}

#[test]
fn booster_is_applied_before_truncation() {
    let (store, service) = build(256);
    let q = service.embed_query("display cpm").expect("q");
    let terms = QueryTerms::new("display cpm", tokenize("display cpm"));
    let hits = store
        .rank(&RankRequest {
            query: &terms,
            embedding: &q,
            semantic_weight: 0.6,
            filter: None,
            booster: Some(&HalveGuides),
            top_k: 1,
        })
        .expect("rank");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.filename, "retail_benchmarks.txt");
    assert!((hits[0].breakdown.metadata_boost - 1.0).abs() < f32::EPSILON);
}

struct FavorGuides;

impl ScoreBooster for FavorGuides {
    fn boost(&self, chunk: &DocumentChunk, _query: &QueryTerms) -> f32 {
        if chunk.metadata.document_type == DocumentType::Guide {
            10.0
        } else {
            1.0
        }
    }
}

#[test]
fn single_signal_searches_apply_the_booster() {
    let (store, service) = build(256);
    let terms = QueryTerms::new("retail", tokenize("retail"));

    let raw = store.search_keyword("retail", 10, None);
    assert!(raw.iter().all(|h| h.breakdown.metadata_boost == 1.0));
    let boosted = store.search_keyword("retail", 1, Some(Boost { booster: &FavorGuides, query: &terms }));
    assert_eq!(boosted.len(), 1);
    assert_eq!(boosted[0].chunk.filename, "audience.md");
    assert_eq!(boosted[0].score, boosted[0].breakdown.keyword * 10.0);

    let q = service.embed_query("display cpm").expect("q");
    let hits = store
        .search_semantic(&q, 4, Some(Boost { booster: &HalveGuides, query: &terms }))
        .expect("semantic");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    for h in &hits {
        let expected = if h.chunk.metadata.document_type == DocumentType::Guide { 0.5 } else { 1.0 };
        assert_eq!(h.breakdown.metadata_boost, expected);
        assert_eq!(h.score, h.breakdown.semantic * expected);
    }
}

#[test]
fn wrong_query_dimension_is_rejected() {
    let (store, _) = build(64);
    assert!(store.search_semantic(&[1.0, 0.0], 3, None).is_err());
}

#[test]
fn persist_and_load_reproduce_semantic_scores_exactly() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("snapshots/mpa.bin");
    let (store, service) = build(128);
    store.persist(&path, "fp-1", service.model().expect("model")).expect("persist");

    let loaded = VectorStore::load(&path, "fp-1", SearchConfig::default()).expect("load").expect("present");
    let restored = EmbeddingService::from_model(EmbeddingConfig { max_features: 128, cache_size: 10 }, loaded.model)
        .expect("service");

    let q1 = service.embed_query("retail cpm benchmark").expect("q1");
    let q2 = restored.embed_query("retail cpm benchmark").expect("q2");
    assert_eq!(q1, q2);

    let before = store.search_semantic(&q1, 4, None).expect("before");
    let after = loaded.store.search_semantic(&q2, 4, None).expect("after");
    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(a.chunk, b.chunk);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
    }
}

#[test]
fn load_returns_none_for_missing_or_stale_snapshot() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("kb.bin");
    assert!(VectorStore::load(&path, "fp", SearchConfig::default()).expect("load").is_none());

    let (store, service) = build(64);
    store.persist(&path, "old", service.model().expect("model")).expect("persist");
    assert!(VectorStore::load(&path, "new", SearchConfig::default()).expect("load").is_none());
}
