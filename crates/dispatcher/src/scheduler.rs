//! 共识工作调度器
//!
//! 每个调度器运行一个循环：找到最久未更新的空闲账本节点，用短期声明抢占它，
//! 把工作机会交给节点的共识插件，等待工作结束后继续下一轮。
//! 调度器之间只通过租约存储的条件更新协调。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ledger_core::{
    models::now_millis, ConsensusRegistry, LeaseStore, LedgerNodeRepository, LedgerResult,
    SchedulerConfig, WorkFinished, WorkSession, WorkSessionState,
};
use ledger_infrastructure::{MetricsCollector, StructuredLogger};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cooldown::Cooldown;
use crate::identity::SchedulerIdentity;

/// 单轮循环的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// 立即进入下一轮
    Continue,
    /// 冷却后进入下一轮
    Cooldown(&'static str),
}

enum Offer {
    Declined,
    Started {
        session_id: String,
        finished: WorkFinished,
    },
}

struct SchedulerInner {
    identity: SchedulerIdentity,
    store: Arc<dyn LeaseStore>,
    nodes: Arc<dyn LedgerNodeRepository>,
    registry: Arc<ConsensusRegistry>,
    config: SchedulerConfig,
    metrics: Arc<MetricsCollector>,
    started: AtomicBool,
    exit_requested: AtomicBool,
    cooldown: Cooldown,
    exited: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        identity: SchedulerIdentity,
        store: Arc<dyn LeaseStore>,
        nodes: Arc<dyn LedgerNodeRepository>,
        registry: Arc<ConsensusRegistry>,
        config: SchedulerConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (exited, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                identity,
                store,
                nodes,
                registry,
                config,
                metrics,
                started: AtomicBool::new(false),
                exit_requested: AtomicBool::new(false),
                cooldown: Cooldown::new(),
                exited,
            }),
        }
    }

    pub fn id(&self) -> &str {
        self.inner.identity.as_str()
    }

    /// 在 tokio 运行时上启动调度循环
    ///
    /// 重复调用不会启动第二个循环，返回的句柄在循环退出时结束。
    pub fn start(&self) -> JoinHandle<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            warn!("调度器 {} 已经启动，忽略重复启动", self.id());
            let scheduler = self.clone();
            return tokio::spawn(async move { scheduler.wait_exited().await });
        }

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run().await })
    }

    /// 请求退出；当前一轮结束后循环退出，冷却会被立即打断
    pub fn request_exit(&self) {
        self.inner.exit_requested.store(true, Ordering::SeqCst);
        // 从未启动的调度器直接视为已退出
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.inner.exited.send_replace(true);
        }
        self.inner.cooldown.interrupt();
    }

    /// 提前结束当前冷却，例如新增了账本节点
    pub fn wake(&self) {
        self.inner.cooldown.interrupt();
    }

    pub fn is_exited(&self) -> bool {
        *self.inner.exited.borrow()
    }

    pub async fn wait_exited(&self) {
        let mut exited = self.inner.exited.subscribe();
        // 发送端由 self 持有，不会提前关闭
        let _ = exited.wait_for(|exited| *exited).await;
    }
}

impl SchedulerInner {
    async fn run(&self) {
        let scheduler_id = self.identity.as_str();
        StructuredLogger::log_scheduler_started(scheduler_id);

        let mut rejected_node_id: Option<String> = None;

        while !self.exit_requested.load(Ordering::SeqCst) {
            let step = match self.run_once(&mut rejected_node_id).await {
                Ok(step) => step,
                Err(e) => {
                    if e.is_transient() {
                        self.metrics.record_store_error();
                    }
                    StructuredLogger::log_scheduler_error(scheduler_id, &e.to_string());
                    rejected_node_id = None;
                    Step::Cooldown("error")
                }
            };

            match step {
                Step::Continue => tokio::task::yield_now().await,
                Step::Cooldown(reason) => {
                    if self.exit_requested.load(Ordering::SeqCst) {
                        break;
                    }
                    let cooldown = self.config.cooldown();
                    self.metrics.record_cooldown();
                    StructuredLogger::log_scheduler_cooldown(scheduler_id, cooldown, reason);
                    if !self.cooldown.wait(cooldown).await {
                        debug!("调度器 {} 的冷却被提前唤醒", scheduler_id);
                    }
                }
            }
        }

        self.exited.send_replace(true);
        StructuredLogger::log_scheduler_exited(scheduler_id);
    }

    async fn run_once(&self, rejected_node_id: &mut Option<String>) -> LedgerResult<Step> {
        let scheduler_id = self.identity.as_str();
        let now = now_millis();

        let ledger_node_id = match self.store.find_least_recently_updated_idle(now).await? {
            None => {
                *rejected_node_id = None;
                return Ok(Step::Cooldown("no_idle_node"));
            }
            Some(id) if rejected_node_id.as_deref() == Some(id.as_str()) => {
                *rejected_node_id = None;
                return Ok(Step::Cooldown("repeated_rejection"));
            }
            Some(id) => id,
        };

        let claim_expires = now.saturating_add(duration_millis(self.config.claim_ttl()));
        let claimed = self
            .store
            .try_claim(&ledger_node_id, scheduler_id, claim_expires, now)
            .await?;
        self.metrics.record_claim_attempt(claimed);
        if !claimed {
            // 有竞争说明还有工作，立即重试
            debug!("调度器 {} 声明节点 {} 失败", scheduler_id, ledger_node_id);
            return Ok(Step::Continue);
        }
        StructuredLogger::log_node_claimed(scheduler_id, &ledger_node_id, claim_expires);

        let offer = match self.offer(&ledger_node_id).await {
            Ok(offer) => offer,
            Err(e) => {
                // 冷却前归还声明
                self.release_claim_after_error(&ledger_node_id).await;
                return Err(e);
            }
        };

        match offer {
            Offer::Declined => {
                self.metrics.record_offer_declined();
                if !self.store.release_claim(&ledger_node_id, scheduler_id).await? {
                    debug!(
                        "节点 {} 的声明已不再由调度器 {} 持有",
                        ledger_node_id, scheduler_id
                    );
                }
                *rejected_node_id = Some(ledger_node_id);
            }
            Offer::Started {
                session_id,
                finished,
            } => {
                self.metrics.record_work_session_started();
                let started_at = Instant::now();
                let outcome = finished.wait_outcome().await;
                self.metrics.record_work_session_finished(
                    outcome.result.is_ok(),
                    outcome.released,
                    started_at.elapsed().as_secs_f64(),
                );

                if let Err(e) = outcome.result {
                    StructuredLogger::log_work_failed(
                        scheduler_id,
                        &session_id,
                        &ledger_node_id,
                        &e.to_string(),
                    );
                }
                *rejected_node_id = None;
            }
        }

        Ok(Step::Continue)
    }

    async fn release_claim_after_error(&self, ledger_node_id: &str) {
        let scheduler_id = self.identity.as_str();
        match self.store.release_claim(ledger_node_id, scheduler_id).await {
            Ok(released) => debug!(
                "调度器 {} 出错后归还节点 {} 的声明: {}",
                scheduler_id, ledger_node_id, released
            ),
            Err(e) => warn!(
                "调度器 {} 归还节点 {} 的声明失败，声明将在到期后失效: {}",
                scheduler_id, ledger_node_id, e
            ),
        }
    }

    /// 把已声明的节点交给它的共识插件
    ///
    /// 记录消失、插件未注册或插件出错都按拒绝处理。
    async fn offer(&self, ledger_node_id: &str) -> LedgerResult<Offer> {
        let scheduler_id = self.identity.as_str();

        let record = match self.nodes.get(ledger_node_id).await? {
            Some(record) if record.is_active() => record,
            _ => {
                warn!("账本节点 {} 已被删除，放弃本次声明", ledger_node_id);
                return Ok(Offer::Declined);
            }
        };

        let adapter = match self.registry.resolve(&record.consensus_method).await {
            Ok(adapter) => adapter,
            Err(e) => {
                StructuredLogger::log_offer_failed(
                    scheduler_id,
                    ledger_node_id,
                    &record.consensus_method,
                    &e.to_string(),
                );
                return Ok(Offer::Declined);
            }
        };

        let mut session = WorkSession::new(
            scheduler_id,
            ledger_node_id,
            self.store.clone(),
            self.config.work_session_grace_period(),
        );

        match adapter.schedule_work(&mut session).await {
            Ok(scheduled) if session.is_started() => Ok(Offer::Started {
                session_id: session.id().to_string(),
                finished: scheduled.finished,
            }),
            Ok(_) => {
                StructuredLogger::log_offer_declined(
                    scheduler_id,
                    ledger_node_id,
                    &record.consensus_method,
                );
                Ok(Offer::Declined)
            }
            Err(e) if session.is_started() => {
                // 工作已在运行，完成句柄丢失，改为等待会话释放
                StructuredLogger::log_offer_failed(
                    scheduler_id,
                    ledger_node_id,
                    &record.consensus_method,
                    &e.to_string(),
                );
                let mut state = session.subscribe_state();
                let _ = state
                    .wait_for(|state| *state == WorkSessionState::Released)
                    .await;
                Ok(Offer::Started {
                    session_id: session.id().to_string(),
                    finished: WorkFinished::ready(),
                })
            }
            Err(e) => {
                StructuredLogger::log_offer_failed(
                    scheduler_id,
                    ledger_node_id,
                    &record.consensus_method,
                    &e.to_string(),
                );
                Ok(Offer::Declined)
            }
        }
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
