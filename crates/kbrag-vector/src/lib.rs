//! kbrag-vector
//!
//! In-memory chunk store with semantic, keyword, hybrid and filtered search,
//! and the snapshot format used to skip re-ingestion of an unchanged KB.
pub mod snapshot;
pub mod store;

pub use snapshot::{fingerprint, LoadedSnapshot, Snapshot, SNAPSHOT_VERSION};
pub use store::{merge_context, Boost, RankRequest, VectorStore};
