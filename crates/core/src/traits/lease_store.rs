//! 租约存储接口
//!
//! 账本节点记录上的 `workSession` 字段是调度器之间唯一的协调手段。
//! 此处所有写操作都必须是单次原子条件更新（按当前租约所有者/过期时间做
//! compare-and-swap），绝不能先读后写。
//!
//! 任何操作都可能因为存储暂时不可用而失败，调用方把失败视为
//! "未获取/未释放"，在下一轮循环或冷却之后重试。

use async_trait::async_trait;

use crate::errors::LedgerResult;

#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// 返回活跃、无有效租约、`updated` 最小的节点ID。
    ///
    /// `updated` 相同时按节点ID升序取第一个。
    async fn find_least_recently_updated_idle(&self, now: i64) -> LedgerResult<Option<String>>;

    /// 仅当节点活跃且当前租约已过期时，写入调度器声明并把 `updated` 更新为 `now`。
    ///
    /// 恰好匹配一条记录时返回 `true`；`false` 表示其他参与者先一步声明。
    async fn try_claim(
        &self,
        ledger_node_id: &str,
        scheduler_id: &str,
        claim_expires: i64,
        now: i64,
    ) -> LedgerResult<bool>;

    /// 仅当当前租约ID仍等于 `scheduler_id` 时，把调度器声明替换为Worker租约。
    async fn try_convert_claim(
        &self,
        ledger_node_id: &str,
        scheduler_id: &str,
        session_id: &str,
        worker_expires: i64,
    ) -> LedgerResult<bool>;

    /// 仅当当前租约ID等于 `session_id` 时清空租约。不匹配不是错误。
    async fn release(&self, ledger_node_id: &str, session_id: &str) -> LedgerResult<bool>;

    /// 同 [`LeaseStore::release`]，但按调度器ID匹配；用于插件拒绝工作时。
    async fn release_claim(&self, ledger_node_id: &str, scheduler_id: &str) -> LedgerResult<bool>;
}
