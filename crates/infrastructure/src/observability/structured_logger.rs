//! Structured logging utilities
//!
//! 调度循环中每一类事件使用固定的 `event` 字段名，便于按事件聚合日志。

use std::time::Duration;

use tracing::{debug, error, info, warn};

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Structured logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Structured logging utilities
pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_scheduler_started(scheduler_id: &str) {
        info!(
            event = "scheduler_started",
            scheduler.id = scheduler_id,
            "调度器已启动"
        );
    }

    pub fn log_scheduler_exited(scheduler_id: &str) {
        info!(
            event = "scheduler_exited",
            scheduler.id = scheduler_id,
            "调度器已退出"
        );
    }

    /// 调度器赢得了节点声明
    pub fn log_node_claimed(scheduler_id: &str, ledger_node_id: &str, claim_expires: i64) {
        debug!(
            event = "node_claimed",
            scheduler.id = scheduler_id,
            ledger_node.id = ledger_node_id,
            claim.expires = claim_expires,
            "声明账本节点成功"
        );
    }

    /// 共识插件拒绝了工作机会
    pub fn log_offer_declined(scheduler_id: &str, ledger_node_id: &str, consensus_method: &str) {
        debug!(
            event = "offer_declined",
            scheduler.id = scheduler_id,
            ledger_node.id = ledger_node_id,
            consensus.method = consensus_method,
            "共识插件未接受工作"
        );
    }

    pub fn log_offer_failed(
        scheduler_id: &str,
        ledger_node_id: &str,
        consensus_method: &str,
        error: &str,
    ) {
        warn!(
            event = "offer_failed",
            scheduler.id = scheduler_id,
            ledger_node.id = ledger_node_id,
            consensus.method = consensus_method,
            error = error,
            "提供工作机会失败，按拒绝处理"
        );
    }

    pub fn log_work_failed(
        scheduler_id: &str,
        session_id: &str,
        ledger_node_id: &str,
        error: &str,
    ) {
        warn!(
            event = "work_failed",
            scheduler.id = scheduler_id,
            work_session.id = session_id,
            ledger_node.id = ledger_node_id,
            error = error,
            "工作会话执行失败"
        );
    }

    pub fn log_scheduler_cooldown(scheduler_id: &str, cooldown: Duration, reason: &str) {
        debug!(
            event = "scheduler_cooldown",
            scheduler.id = scheduler_id,
            cooldown_ms = cooldown.as_millis() as u64,
            reason = reason,
            "调度器进入冷却"
        );
    }

    pub fn log_scheduler_error(scheduler_id: &str, error: &str) {
        error!(
            event = "scheduler_error",
            scheduler.id = scheduler_id,
            error = error,
            "调度循环出错"
        );
    }
}
