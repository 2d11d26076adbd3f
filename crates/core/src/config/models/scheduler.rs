use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 共识工作调度器配置（毫秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// 没有可做的工作时两次循环之间的冷却时间
    pub cooldown_ms: u64,
    /// 调度器声明在被其他调度器覆盖前的存活时间
    pub claim_ttl_ms: u64,
    /// Worker租约在 `maxAge` 之外额外保留的时间
    pub work_session_grace_period_ms: u64,
}

impl SchedulerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn claim_ttl(&self) -> Duration {
        Duration::from_millis(self.claim_ttl_ms)
    }

    pub fn work_session_grace_period(&self) -> Duration {
        Duration::from_millis(self.work_session_grace_period_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cooldown_ms == 0 {
            return Err(anyhow::anyhow!("冷却时间必须大于0"));
        }

        if self.claim_ttl_ms == 0 {
            return Err(anyhow::anyhow!("调度器声明有效期必须大于0"));
        }

        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: 1_000,
            claim_ttl_ms: 30_000,
            work_session_grace_period_ms: 30_000,
        }
    }
}
