use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{
    models::{now_millis, LedgerNodeRecord},
    registry::ConsensusRegistry,
    traits::LedgerNodeRepository,
    LedgerError, LedgerResult,
};

/// 账本节点管理服务
///
/// 新节点在创建时校验共识插件已注册，创建后处于活跃、无租约状态，
/// 由调度器按最近最少更新的顺序发现。
pub struct LedgerNodeService {
    repository: Arc<dyn LedgerNodeRepository>,
    registry: Arc<ConsensusRegistry>,
}

impl LedgerNodeService {
    pub fn new(repository: Arc<dyn LedgerNodeRepository>, registry: Arc<ConsensusRegistry>) -> Self {
        Self {
            repository,
            registry,
        }
    }

    pub async fn add(
        &self,
        ledger_node_id: Option<String>,
        consensus_method: &str,
    ) -> LedgerResult<LedgerNodeRecord> {
        if !self.registry.contains(consensus_method).await {
            return Err(LedgerError::NotRegistered {
                name: consensus_method.to_string(),
            });
        }

        let id = match ledger_node_id {
            Some(id) if id.trim().is_empty() => {
                return Err(LedgerError::InvalidConfiguration(
                    "账本节点ID不能为空".to_string(),
                ))
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let record = LedgerNodeRecord::new(id, consensus_method, now_millis());
        self.repository.insert(&record).await?;

        info!(
            "创建账本节点 {}，共识插件: {}",
            record.id, record.consensus_method
        );
        Ok(record)
    }

    pub async fn get(&self, ledger_node_id: &str) -> LedgerResult<LedgerNodeRecord> {
        match self.repository.get(ledger_node_id).await? {
            Some(record) if record.is_active() => Ok(record),
            _ => Err(LedgerError::LedgerNodeNotFound {
                id: ledger_node_id.to_string(),
            }),
        }
    }

    pub async fn list(&self) -> LedgerResult<Vec<LedgerNodeRecord>> {
        self.repository.list(false).await
    }

    pub async fn remove(&self, ledger_node_id: &str) -> LedgerResult<()> {
        if !self
            .repository
            .mark_deleted(ledger_node_id, now_millis())
            .await?
        {
            return Err(LedgerError::LedgerNodeNotFound {
                id: ledger_node_id.to_string(),
            });
        }

        info!("删除账本节点 {}", ledger_node_id);
        Ok(())
    }
}
