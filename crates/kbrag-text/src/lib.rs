//! kbrag-text
//!
//! Text analysis shared by the keyword index, the TF-IDF embedder and the
//! booster, plus the in-memory BM25 index used for keyword retrieval.
pub mod analysis;
pub mod bm25;

pub use analysis::{tokenize, STOP_WORDS};
pub use bm25::Bm25Index;
