//! kbrag-hybrid
//!
//! Query expansion, metadata boosting and the retrieval engine that ties the
//! chunker, embedder and vector store together, plus the multi-agent context
//! and the tool-facing API built on top of it.
pub mod boost;
pub mod context;
pub mod engine;
pub mod expansion;
pub mod tools;

pub use boost::MetadataBooster;
pub use context::RagContext;
pub use engine::{EngineStatus, RetrievalEngine};
pub use expansion::QueryExpander;
pub use tools::{BenchmarkAnswer, Confidence, KnowledgeBaseResponse, KnowledgeTools, Snippet};
