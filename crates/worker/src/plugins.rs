use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledger_core::{
    ConsensusPluginAdapter, ConsensusRegistry, LedgerResult, ScheduledWork, WorkSession,
};
use tracing::{debug, info};

use crate::work_source::WorkSource;

pub const NOOP_PLUGIN: &str = "noop";
pub const BATCH_PLUGIN: &str = "batch";

/// 接受每一次工作机会，工作函数立即完成
///
/// 用于压测和存活检查：接受后调度器不冷却，只要存在 `noop` 节点，
/// 调度循环就会持续在这些节点之间轮转。生产节点应使用会在无事可做时拒绝的插件，
/// 例如 [`BatchConsensusAdapter`]。
pub struct NoopConsensusAdapter {
    max_age: Duration,
}

impl NoopConsensusAdapter {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

impl Default for NoopConsensusAdapter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl ConsensusPluginAdapter for NoopConsensusAdapter {
    async fn schedule_work(&self, session: &mut WorkSession) -> LedgerResult<ScheduledWork> {
        Ok(session
            .start(self.max_age, |active| async move {
                debug!("noop 工作会话 {} 完成", active.id);
                Ok(())
            })
            .await)
    }
}

/// 有待处理工作时接受工作机会，在会话时间窗口内逐条处理
///
/// 时间用完时主动停止，剩余工作留给下一个会话。
pub struct BatchConsensusAdapter {
    source: Arc<dyn WorkSource>,
    max_age: Duration,
}

impl BatchConsensusAdapter {
    pub fn new(source: Arc<dyn WorkSource>, max_age: Duration) -> Self {
        Self { source, max_age }
    }
}

#[async_trait]
impl ConsensusPluginAdapter for BatchConsensusAdapter {
    async fn schedule_work(&self, session: &mut WorkSession) -> LedgerResult<ScheduledWork> {
        if !self.source.has_pending(session.ledger_node_id()).await? {
            return Ok(ScheduledWork::declined());
        }

        let source = self.source.clone();
        Ok(session
            .start(self.max_age, move |active| async move {
                let mut processed = 0usize;
                while !active.is_expired() {
                    if !source.process_one(&active.ledger_node_id).await? {
                        break;
                    }
                    processed += 1;
                }

                debug!(
                    "账本节点 {} 的工作会话 {} 处理了 {} 条操作",
                    active.ledger_node_id, active.id, processed
                );
                Ok(())
            })
            .await)
    }
}

/// 注册内置的共识插件
pub async fn register_reference_plugins(
    registry: &ConsensusRegistry,
    source: Arc<dyn WorkSource>,
) {
    registry
        .register_batch(vec![
            (
                NOOP_PLUGIN.to_string(),
                Arc::new(NoopConsensusAdapter::default()) as Arc<dyn ConsensusPluginAdapter>,
            ),
            (
                BATCH_PLUGIN.to_string(),
                Arc::new(BatchConsensusAdapter::new(source, Duration::from_secs(10)))
                    as Arc<dyn ConsensusPluginAdapter>,
            ),
        ])
        .await;

    info!("已注册 {} 个内置共识插件", registry.count().await);
}
