//! 账本节点仓储接口
//!
//! 负责账本节点记录的创建、查询与逻辑删除。租约字段只能通过
//! [`crate::traits::LeaseStore`] 修改。

use async_trait::async_trait;

use crate::{errors::LedgerResult, models::LedgerNodeRecord};

#[async_trait]
pub trait LedgerNodeRepository: Send + Sync {
    /// 插入新记录；ID已存在时返回 `LedgerNodeExists`
    async fn insert(&self, record: &LedgerNodeRecord) -> LedgerResult<()>;

    async fn get(&self, ledger_node_id: &str) -> LedgerResult<Option<LedgerNodeRecord>>;

    /// 按ID升序列出记录
    async fn list(&self, include_deleted: bool) -> LedgerResult<Vec<LedgerNodeRecord>>;

    /// 写入删除标记；记录不存在或已删除时返回 `false`
    async fn mark_deleted(&self, ledger_node_id: &str, now: i64) -> LedgerResult<bool>;
}
