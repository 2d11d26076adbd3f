pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryLedgerNodeStore;
pub use sqlite::{DatabaseManager, SqliteLedgerNodeStore};

use std::sync::Arc;

use anyhow::Result;
use ledger_core::{DatabaseConfig, LeaseStore, LedgerNodeRepository};
use tracing::info;

/// 同一个存储实例的两个视图：租约操作与记录管理
#[derive(Clone)]
pub struct LedgerNodeStores {
    pub leases: Arc<dyn LeaseStore>,
    pub nodes: Arc<dyn LedgerNodeRepository>,
}

impl LedgerNodeStores {
    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: LeaseStore + LedgerNodeRepository + 'static,
    {
        Self {
            leases: store.clone(),
            nodes: store,
        }
    }
}

/// 按配置创建存储；SQLite 存储在返回前完成迁移
pub async fn build_stores(config: &DatabaseConfig) -> Result<LedgerNodeStores> {
    if config.is_in_memory() {
        info!("使用进程内账本节点存储");
        return Ok(LedgerNodeStores::from_store(Arc::new(
            InMemoryLedgerNodeStore::new(),
        )));
    }

    let manager = DatabaseManager::new(config).await?;
    manager.migrate().await?;
    Ok(LedgerNodeStores::from_store(Arc::new(
        SqliteLedgerNodeStore::new(manager.pool().clone()),
    )))
}
