//! Metrics collector for the ledger node scheduler
//!
//! 没有安装全局 recorder 时，`metrics` 宏返回空操作句柄，因此测试中可以直接构造。

use anyhow::Result;
use metrics::{counter, histogram, Counter, Histogram};

pub struct MetricsCollector {
    claims_attempted_total: Counter,
    claims_won_total: Counter,
    claims_lost_total: Counter,
    offers_declined_total: Counter,
    work_sessions_started_total: Counter,
    work_sessions_failed_total: Counter,
    work_sessions_released_total: Counter,
    cooldowns_total: Counter,
    store_errors_total: Counter,
    work_duration: Histogram,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            claims_attempted_total: counter!("ledger_scheduler_claims_attempted_total"),
            claims_won_total: counter!("ledger_scheduler_claims_won_total"),
            claims_lost_total: counter!("ledger_scheduler_claims_lost_total"),
            offers_declined_total: counter!("ledger_scheduler_offers_declined_total"),
            work_sessions_started_total: counter!("ledger_work_sessions_started_total"),
            work_sessions_failed_total: counter!("ledger_work_sessions_failed_total"),
            work_sessions_released_total: counter!("ledger_work_sessions_released_total"),
            cooldowns_total: counter!("ledger_scheduler_cooldowns_total"),
            store_errors_total: counter!("ledger_store_errors_total"),
            work_duration: histogram!("ledger_work_session_duration_seconds"),
        })
    }

    pub fn record_claim_attempt(&self, won: bool) {
        self.claims_attempted_total.increment(1);
        if won {
            self.claims_won_total.increment(1);
        } else {
            self.claims_lost_total.increment(1);
        }
    }

    pub fn record_offer_declined(&self) {
        self.offers_declined_total.increment(1);
    }

    pub fn record_work_session_started(&self) {
        self.work_sessions_started_total.increment(1);
    }

    /// 记录一个已结束的工作会话
    ///
    /// `released` 为 `false` 表示释放时租约已不属于该会话或存储出错，
    /// 节点要等租约到期后才会重新空闲。
    pub fn record_work_session_finished(&self, succeeded: bool, released: bool, duration_seconds: f64) {
        if !succeeded {
            self.work_sessions_failed_total.increment(1);
        }
        if released {
            self.work_sessions_released_total.increment(1);
        }
        self.work_duration.record(duration_seconds);
    }

    pub fn record_cooldown(&self) {
        self.cooldowns_total.increment(1);
    }

    pub fn record_store_error(&self) {
        self.store_errors_total.increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        let metrics = MetricsCollector::new().unwrap();
        metrics.record_claim_attempt(true);
        metrics.record_claim_attempt(false);
        metrics.record_offer_declined();
        metrics.record_work_session_started();
        metrics.record_work_session_finished(false, true, 0.25);
        metrics.record_work_session_finished(true, false, 0.5);
        metrics.record_cooldown();
        metrics.record_store_error();
    }
}
