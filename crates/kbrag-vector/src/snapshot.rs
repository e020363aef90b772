//! Snapshot persistence.
//!
//! A snapshot is the bincode encoding of every stored chunk, its embedding
//! and the TF-IDF model, stamped with the fingerprint of the KB it was built
//! from. Writes go to a temp file in the target directory and are renamed
//! into place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use kbrag_core::config::SearchConfig;
use kbrag_core::error::{Error, Result};
use kbrag_core::types::DocumentChunk;
use kbrag_embed::TfIdfModel;

use crate::store::VectorStore;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub dimension: usize,
    pub chunks: Vec<DocumentChunk>,
    pub embeddings: Vec<Vec<f32>>,
    pub vocabulary: Vec<String>,
    pub idf: Vec<f32>,
}

pub struct LoadedSnapshot {
    pub store: VectorStore,
    pub model: TfIdfModel,
    pub created_at: DateTime<Utc>,
}

impl VectorStore {
    pub fn persist(&self, path: &Path, fingerprint: &str, model: &TfIdfModel) -> Result<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            fingerprint: fingerprint.to_string(),
            created_at: Utc::now(),
            dimension: self.dim(),
            chunks: self.chunks().iter().map(|sc| sc.chunk.clone()).collect(),
            embeddings: self.chunks().iter().map(|sc| sc.embedding.clone()).collect(),
            vocabulary: model.vocabulary().to_vec(),
            idf: model.idf().to_vec(),
        };
        let bytes = bincode::serialize(&snapshot).map_err(|e| Error::Serialization(e.to_string()))?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        info!(path = %path.display(), chunks = snapshot.chunks.len(), "snapshot written");
        Ok(())
    }

    /// `None` when no snapshot exists or it was built from different input.
    pub fn load(path: &Path, fingerprint: &str, search: SearchConfig) -> Result<Option<LoadedSnapshot>> {
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let snapshot: Snapshot = bincode::deserialize(&bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(found = snapshot.version, expected = SNAPSHOT_VERSION, "ignoring snapshot with another format version");
            return Ok(None);
        }
        if snapshot.fingerprint != fingerprint {
            let mismatch = Error::PersistenceMismatch { expected: fingerprint.to_string(), found: snapshot.fingerprint };
            warn!(path = %path.display(), "{mismatch}");
            return Ok(None);
        }

        let model = TfIdfModel::from_parts(snapshot.dimension, snapshot.vocabulary, snapshot.idf)?;
        let mut store = VectorStore::new(snapshot.dimension, search);
        store.add_chunks(snapshot.chunks, snapshot.embeddings)?;
        info!(path = %path.display(), chunks = store.len(), "snapshot loaded");
        Ok(Some(LoadedSnapshot { store, model, created_at: snapshot.created_at }))
    }
}

/// blake3 over the documents in path order plus the JSON form of every
/// setting that shapes the index.
pub fn fingerprint<S: Serialize>(documents: &[(String, String)], settings: &S) -> Result<String> {
    let mut docs: Vec<&(String, String)> = documents.iter().collect();
    docs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = blake3::Hasher::new();
    for (path, content) in docs {
        hasher.update(&(path.len() as u64).to_le_bytes());
        hasher.update(path.as_bytes());
        hasher.update(&(content.len() as u64).to_le_bytes());
        hasher.update(content.as_bytes());
    }
    hasher.update(serde_json::to_string(settings)?.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_input_order_but_not_content() {
        let a = vec![("a.md".to_string(), "one".to_string()), ("b.md".to_string(), "two".to_string())];
        let b = vec![a[1].clone(), a[0].clone()];
        let fa = fingerprint(&a, &1u32).expect("fp");
        assert_eq!(fa, fingerprint(&b, &1u32).expect("fp"));

        let changed = vec![("a.md".to_string(), "one!".to_string()), a[1].clone()];
        assert_ne!(fa, fingerprint(&changed, &1u32).expect("fp"));
        assert_ne!(fa, fingerprint(&a, &2u32).expect("fp"));
    }

    #[test]
    fn path_content_boundaries_matter() {
        let a = vec![("ab".to_string(), "c".to_string())];
        let b = vec![("a".to_string(), "bc".to_string())];
        assert_ne!(fingerprint(&a, &()).expect("fp"), fingerprint(&b, &()).expect("fp"));
    }
}
