use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use ledger_core::LedgerResult;
use tokio::sync::RwLock;
use tracing::debug;

/// 账本节点待处理工作的来源
#[async_trait]
pub trait WorkSource: Send + Sync {
    async fn has_pending(&self, ledger_node_id: &str) -> LedgerResult<bool>;

    /// 处理一条待处理工作；没有可处理的工作时返回 `false`
    async fn process_one(&self, ledger_node_id: &str) -> LedgerResult<bool>;
}

/// 进程内的操作队列，每个账本节点一个FIFO
#[derive(Default)]
pub struct InMemoryWorkSource {
    pending: RwLock<HashMap<String, VecDeque<String>>>,
    processed: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryWorkSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submit(&self, ledger_node_id: &str, operation: impl Into<String>) {
        let mut pending = self.pending.write().await;
        pending
            .entry(ledger_node_id.to_string())
            .or_default()
            .push_back(operation.into());
    }

    pub async fn pending_count(&self, ledger_node_id: &str) -> usize {
        let pending = self.pending.read().await;
        pending.get(ledger_node_id).map_or(0, VecDeque::len)
    }

    /// 按处理顺序返回已处理的操作
    pub async fn processed(&self, ledger_node_id: &str) -> Vec<String> {
        let processed = self.processed.read().await;
        processed.get(ledger_node_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl WorkSource for InMemoryWorkSource {
    async fn has_pending(&self, ledger_node_id: &str) -> LedgerResult<bool> {
        Ok(self.pending_count(ledger_node_id).await > 0)
    }

    async fn process_one(&self, ledger_node_id: &str) -> LedgerResult<bool> {
        let operation = {
            let mut pending = self.pending.write().await;
            pending
                .get_mut(ledger_node_id)
                .and_then(VecDeque::pop_front)
        };

        match operation {
            Some(operation) => {
                debug!("账本节点 {} 处理操作 {}", ledger_node_id, operation);
                let mut processed = self.processed.write().await;
                processed
                    .entry(ledger_node_id.to_string())
                    .or_default()
                    .push(operation);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_are_processed_in_order() {
        let source = InMemoryWorkSource::new();
        source.submit("node-a", "op-1").await;
        source.submit("node-a", "op-2").await;
        source.submit("node-b", "op-3").await;

        assert!(source.has_pending("node-a").await.unwrap());
        assert!(source.process_one("node-a").await.unwrap());
        assert!(source.process_one("node-a").await.unwrap());
        assert!(!source.process_one("node-a").await.unwrap());

        assert_eq!(source.processed("node-a").await, vec!["op-1", "op-2"]);
        assert!(!source.has_pending("node-a").await.unwrap());
        assert_eq!(source.pending_count("node-b").await, 1);
    }
}
