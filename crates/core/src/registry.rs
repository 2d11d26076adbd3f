use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::{traits::ConsensusPluginAdapter, LedgerError, LedgerResult};

/// 共识插件注册表
///
/// 按名称解析共识插件适配器，调度器每次提供工作机会时解析一次。
pub struct ConsensusRegistry {
    adapters: Arc<RwLock<HashMap<String, Arc<dyn ConsensusPluginAdapter>>>>,
}

impl ConsensusRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, name: impl Into<String>, adapter: Arc<dyn ConsensusPluginAdapter>) {
        let name = name.into();
        debug!("注册共识插件: {}", name);
        let mut registry = self.adapters.write().await;
        registry.insert(name, adapter);
    }

    pub async fn register_batch(&self, adapters: Vec<(String, Arc<dyn ConsensusPluginAdapter>)>) {
        let mut registry = self.adapters.write().await;
        for (name, adapter) in adapters {
            debug!("注册共识插件: {}", name);
            registry.insert(name, adapter);
        }
    }

    pub async fn resolve(&self, name: &str) -> LedgerResult<Arc<dyn ConsensusPluginAdapter>> {
        let registry = self.adapters.read().await;
        registry
            .get(name)
            .cloned()
            .ok_or_else(|| LedgerError::NotRegistered {
                name: name.to_string(),
            })
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let mut registry = self.adapters.write().await;
        registry.remove(name).is_some()
    }

    pub async fn contains(&self, name: &str) -> bool {
        let registry = self.adapters.read().await;
        registry.contains_key(name)
    }

    pub async fn names(&self) -> Vec<String> {
        let registry = self.adapters.read().await;
        let mut names: Vec<String> = registry.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn count(&self) -> usize {
        let registry = self.adapters.read().await;
        registry.len()
    }
}

impl Default for ConsensusRegistry {
    fn default() -> Self {
        Self::new()
    }
}
