//! kbrag-embed
//!
//! TF-IDF embeddings over the KB vocabulary with a bounded LRU cache for
//! query vectors.
pub mod cache;
pub mod model;
pub mod service;

pub use cache::QueryCache;
pub use model::TfIdfModel;
pub use service::EmbeddingService;
