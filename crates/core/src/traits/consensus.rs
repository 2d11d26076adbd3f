use async_trait::async_trait;

use crate::errors::LedgerResult;
use crate::work_session::{ScheduledWork, WorkSession};

/// 共识插件适配器
///
/// 每次调度器提供工作机会时调用一次。接受工作时必须在内部调用
/// [`WorkSession::start`] 并返回其结果；拒绝时不调用 `start`，直接返回
/// [`ScheduledWork::declined`]。
#[async_trait]
pub trait ConsensusPluginAdapter: Send + Sync {
    async fn schedule_work(&self, session: &mut WorkSession) -> LedgerResult<ScheduledWork>;
}
