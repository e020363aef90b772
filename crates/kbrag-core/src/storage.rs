//! Storage providers: the local filesystem and an in-memory map.

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::resolve_with_base;
use crate::error::{Error, Result};
use crate::traits::StorageProvider;

/// Filesystem storage. Relative paths resolve against `root`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        resolve_with_base(&self.root, path.to_string_lossy())
    }
}

impl StorageProvider for LocalStorage {
    fn read_document(&self, path: &Path) -> Result<String> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(Error::NotFound(full.display().to_string()));
        }
        let bytes = fs::read(&full)?;
        String::from_utf8(bytes).map_err(|_| Error::Encoding { path: path.display().to_string() })
    }

    fn write_document(&self, path: &Path, content: &str) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, content)?;
        Ok(())
    }

    fn list_documents(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let full = self.resolve(dir);
        if !full.is_dir() {
            return Err(Error::NotFound(full.display().to_string()));
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&full).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            // hand back paths in the caller's form
            let rel = entry.path().strip_prefix(&full).unwrap_or(entry.path());
            files.push(dir.join(rel));
        }
        files.sort();
        Ok(files)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }
}

/// Map-backed storage for tests and hosts that hand documents over in memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, P, S>(docs: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let storage = Self::new();
        {
            let mut files = storage.files.write();
            for (p, s) in docs {
                files.insert(p.into(), s.into().into_bytes());
            }
        }
        storage
    }

    /// Store raw bytes, which need not be valid UTF-8.
    pub fn insert_bytes(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.files.write().insert(path.into(), bytes);
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.files.write().remove(path).is_some()
    }
}

impl StorageProvider for InMemoryStorage {
    fn read_document(&self, path: &Path) -> Result<String> {
        let files = self.files.read();
        let bytes = files.get(path).ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        String::from_utf8(bytes.clone()).map_err(|_| Error::Encoding { path: path.display().to_string() })
    }

    fn write_document(&self, path: &Path, content: &str) -> Result<()> {
        self.files.write().insert(path.to_path_buf(), content.as_bytes().to_vec());
        Ok(())
    }

    fn list_documents(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.files.read().keys().filter(|p| p.starts_with(dir)).cloned().collect())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.read();
        files.contains_key(path) || files.keys().any(|p| p.starts_with(path))
    }
}

pub fn read_json<T: DeserializeOwned>(storage: &dyn StorageProvider, path: &Path) -> Result<T> {
    let raw = storage.read_document(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_json<T: Serialize>(storage: &dyn StorageProvider, path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    storage.write_document(path, &raw)
}
