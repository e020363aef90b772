use kbrag_core::config::SearchConfig;
use kbrag_text::{tokenize, Bm25Index};

#[test]
fn shorter_document_wins_on_equal_term_frequency() {
    let mut idx = Bm25Index::from_config(&SearchConfig::default());
    idx.add("frequency capping keeps reach efficient");
    idx.add(
        "frequency capping appears once here among many other words about planning budgets \
         creative rotation flighting pacing and reporting cadence",
    );
    idx.add("unrelated text about podcasts");

    let hits = idx.search(&tokenize("frequency capping"), 3);
    assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn top_k_truncates_and_order_is_non_increasing() {
    let mut idx = Bm25Index::from_config(&SearchConfig::default());
    for i in 0..10 {
        let body = format!("{} roas optimisation note {i}", "roas ".repeat(i % 3 + 1));
        idx.add(&body);
    }
    let hits = idx.search(&tokenize("roas"), 4);
    assert_eq!(hits.len(), 4);
    assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
}

#[test]
fn empty_index_returns_nothing() {
    let idx = Bm25Index::new(1.5, 0.75);
    assert!(idx.is_empty());
    assert_eq!(idx.avgdl(), 0.0);
    assert!(idx.search(&tokenize("anything"), 5).is_empty());
}
