//! Explicit multi-agent context: one retrieval engine per agent, sharing a
//! storage provider and the workspace settings.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use kbrag_core::agent::{AgentRagConfig, CompiledAgentConfig};
use kbrag_core::config::RagSettings;
use kbrag_core::error::{Error, Result};
use kbrag_core::traits::StorageProvider;
use kbrag_core::types::IngestionSummary;

use crate::engine::RetrievalEngine;

pub struct RagContext {
    settings: RagSettings,
    storage: Arc<dyn StorageProvider>,
    engines: RwLock<BTreeMap<String, Arc<RetrievalEngine>>>,
}

impl RagContext {
    pub fn new(settings: RagSettings, storage: Arc<dyn StorageProvider>) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings, storage, engines: RwLock::new(BTreeMap::new()) })
    }

    /// Compile `config` and register a fresh, uninitialized engine for it,
    /// replacing any engine previously registered under the same id.
    pub fn register(&self, config: AgentRagConfig) -> Result<Arc<RetrievalEngine>> {
        if config.agent_id.trim().is_empty() {
            return Err(Error::config("agent_id must not be empty"));
        }
        let id = config.agent_id.clone();
        let agent = Arc::new(CompiledAgentConfig::new(config)?);
        let engine = Arc::new(RetrievalEngine::new(agent, self.settings.clone(), Arc::clone(&self.storage))?);
        if self.engines.write().insert(id.clone(), Arc::clone(&engine)).is_some() {
            info!(agent = %id, "agent configuration replaced");
        }
        Ok(engine)
    }

    pub fn engine(&self, agent_id: &str) -> Result<Arc<RetrievalEngine>> {
        self.engines
            .read()
            .get(agent_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("agent '{agent_id}'")))
    }

    pub fn remove(&self, agent_id: &str) -> bool {
        self.engines.write().remove(agent_id).is_some()
    }

    pub fn agents(&self) -> Vec<String> {
        self.engines.read().keys().cloned().collect()
    }

    /// Initialize every registered engine, stopping at the first failure.
    pub fn initialize_all(&self) -> Result<Vec<(String, IngestionSummary)>> {
        let engines: Vec<(String, Arc<RetrievalEngine>)> =
            self.engines.read().iter().map(|(id, e)| (id.clone(), Arc::clone(e))).collect();
        engines
            .into_iter()
            .map(|(id, engine)| Ok((id, engine.initialize()?)))
            .collect()
    }
}
