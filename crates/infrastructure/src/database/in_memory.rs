use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ledger_core::{
    models::{LedgerNodeRecord, WorkSessionLease},
    LeaseStore, LedgerError, LedgerNodeRepository, LedgerResult,
};
use tokio::sync::RwLock;
use tracing::debug;

/// 进程内账本节点存储
///
/// 每个条件更新都在同一把写锁内完成判断与写入，等价于单行事务。
pub struct InMemoryLedgerNodeStore {
    records: RwLock<HashMap<String, LedgerNodeRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryLedgerNodeStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// 模拟存储不可用，之后所有操作返回 `LedgerError::Storage`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 直接覆盖某条记录的租约，不做任何条件判断（测试和运维修复使用）
    pub async fn force_lease(&self, ledger_node_id: &str, lease: WorkSessionLease) -> LedgerResult<()> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(ledger_node_id)
            .ok_or_else(|| LedgerError::LedgerNodeNotFound {
                id: ledger_node_id.to_string(),
            })?;
        record.work_session = lease;
        Ok(())
    }

    fn check_available(&self) -> LedgerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage("内存存储被标记为不可用".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryLedgerNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLedgerNodeStore {
    async fn find_least_recently_updated_idle(&self, now: i64) -> LedgerResult<Option<String>> {
        self.check_available()?;
        let records = self.records.read().await;
        let candidate = records
            .values()
            .filter(|record| record.is_idle(now))
            .min_by(|a, b| a.updated.cmp(&b.updated).then_with(|| a.id.cmp(&b.id)))
            .map(|record| record.id.clone());
        Ok(candidate)
    }

    async fn try_claim(
        &self,
        ledger_node_id: &str,
        scheduler_id: &str,
        claim_expires: i64,
        now: i64,
    ) -> LedgerResult<bool> {
        self.check_available()?;
        let mut records = self.records.write().await;
        match records.get_mut(ledger_node_id) {
            Some(record) if record.is_idle(now) => {
                record.work_session = WorkSessionLease::scheduler_claim(scheduler_id, claim_expires);
                record.updated = now;
                debug!("调度器 {} 声明节点 {}", scheduler_id, ledger_node_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn try_convert_claim(
        &self,
        ledger_node_id: &str,
        scheduler_id: &str,
        session_id: &str,
        worker_expires: i64,
    ) -> LedgerResult<bool> {
        self.check_available()?;
        let mut records = self.records.write().await;
        match records.get_mut(ledger_node_id) {
            Some(record) if record.is_active() && record.work_session.is_held_by(scheduler_id) => {
                record.work_session = WorkSessionLease::worker(session_id, worker_expires);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, ledger_node_id: &str, session_id: &str) -> LedgerResult<bool> {
        self.check_available()?;
        let mut records = self.records.write().await;
        match records.get_mut(ledger_node_id) {
            Some(record) if record.work_session.is_held_by(session_id) => {
                record.work_session = WorkSessionLease::vacant();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_claim(&self, ledger_node_id: &str, scheduler_id: &str) -> LedgerResult<bool> {
        self.release(ledger_node_id, scheduler_id).await
    }
}

#[async_trait]
impl LedgerNodeRepository for InMemoryLedgerNodeStore {
    async fn insert(&self, record: &LedgerNodeRecord) -> LedgerResult<()> {
        self.check_available()?;
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(LedgerError::LedgerNodeExists {
                id: record.id.clone(),
            });
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, ledger_node_id: &str) -> LedgerResult<Option<LedgerNodeRecord>> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records.get(ledger_node_id).cloned())
    }

    async fn list(&self, include_deleted: bool) -> LedgerResult<Vec<LedgerNodeRecord>> {
        self.check_available()?;
        let records = self.records.read().await;
        let mut list: Vec<LedgerNodeRecord> = records
            .values()
            .filter(|record| include_deleted || record.is_active())
            .cloned()
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn mark_deleted(&self, ledger_node_id: &str, now: i64) -> LedgerResult<bool> {
        self.check_available()?;
        let mut records = self.records.write().await;
        match records.get_mut(ledger_node_id) {
            Some(record) if record.is_active() => {
                record.deleted = Some(now);
                record.updated = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
