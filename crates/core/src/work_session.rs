//! 工作会话
//!
//! 一个工作会话代表对单个账本节点在有限时间窗口内的独占预留。
//! 调度器为每次工作机会创建一个新会话，共识插件通过 [`WorkSession::start`]
//! 把调度器声明转换为Worker租约并异步执行工作函数。
//!
//! ```text
//! Created → Reserving → {Reserved, RejectedReservation} → Running → Released
//! ```
//!
//! 工作函数结束（成功、返回错误或panic）后，会话无条件按会话ID释放租约，
//! 然后通过 [`WorkFinished`] 通知等待方。会话不会强制中断工作函数，
//! 工作函数需要自行轮询 [`ActiveWorkSession::time_remaining`]。

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::FutureExt;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::{LedgerError, LedgerResult};
use crate::models::now_millis;
use crate::traits::LeaseStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkSessionState {
    Created,
    Reserving,
    Reserved,
    RejectedReservation,
    Running,
    Released,
}

/// 传给工作函数的会话视图
#[derive(Debug, Clone)]
pub struct ActiveWorkSession {
    pub id: String,
    pub scheduler_id: String,
    pub ledger_node_id: String,
    pub start_time: DateTime<Utc>,
    pub max_age: Duration,
}

impl ActiveWorkSession {
    pub fn time_remaining(&self) -> Duration {
        remaining_since(Some(self.start_time), self.max_age, Utc::now())
    }

    pub fn is_expired(&self) -> bool {
        self.time_remaining().is_zero()
    }
}

/// 工作函数的结果，以及会话结束时租约是否确实由本会话释放
#[derive(Debug)]
pub struct WorkOutcome {
    pub result: LedgerResult<()>,
    pub released: bool,
}

/// 工作完成句柄
#[derive(Debug)]
pub struct WorkFinished {
    receiver: Option<oneshot::Receiver<WorkOutcome>>,
}

impl WorkFinished {
    /// 立即完成的句柄（工作未启动时使用）
    pub fn ready() -> Self {
        Self { receiver: None }
    }

    /// 等待工作函数结束且租约释放完成，返回工作函数的结果
    pub async fn wait(self) -> LedgerResult<()> {
        self.wait_outcome().await.result
    }

    pub async fn wait_outcome(self) -> WorkOutcome {
        match self.receiver {
            None => WorkOutcome {
                result: Ok(()),
                released: false,
            },
            Some(receiver) => receiver.await.unwrap_or_else(|_| WorkOutcome {
                result: Err(LedgerError::Internal(
                    "工作任务在报告结果之前被丢弃".to_string(),
                )),
                released: false,
            }),
        }
    }
}

/// `start` 的返回值：是否启动，以及完成句柄
#[derive(Debug)]
pub struct ScheduledWork {
    pub started: bool,
    pub finished: WorkFinished,
}

impl ScheduledWork {
    pub fn declined() -> Self {
        Self {
            started: false,
            finished: WorkFinished::ready(),
        }
    }
}

pub struct WorkSession {
    id: String,
    scheduler_id: String,
    ledger_node_id: String,
    store: Arc<dyn LeaseStore>,
    grace_period: Duration,
    max_age: Duration,
    start_time: Option<DateTime<Utc>>,
    started: bool,
    state: Arc<watch::Sender<WorkSessionState>>,
}

impl WorkSession {
    pub fn new(
        scheduler_id: impl Into<String>,
        ledger_node_id: impl Into<String>,
        store: Arc<dyn LeaseStore>,
        grace_period: Duration,
    ) -> Self {
        let (state, _) = watch::channel(WorkSessionState::Created);
        Self {
            id: Uuid::new_v4().to_string(),
            scheduler_id: scheduler_id.into(),
            ledger_node_id: ledger_node_id.into(),
            store,
            grace_period,
            max_age: Duration::ZERO,
            start_time: None,
            started: false,
            state: Arc::new(state),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scheduler_id(&self) -> &str {
        &self.scheduler_id
    }

    pub fn ledger_node_id(&self) -> &str {
        &self.ledger_node_id
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn state(&self) -> WorkSessionState {
        *self.state.borrow()
    }

    /// 订阅状态变化，用于观察 `Released`
    pub fn subscribe_state(&self) -> watch::Receiver<WorkSessionState> {
        self.state.subscribe()
    }

    pub fn time_remaining(&self) -> Duration {
        remaining_since(self.start_time, self.max_age, Utc::now())
    }

    pub fn is_expired(&self) -> bool {
        self.time_remaining().is_zero()
    }

    /// 预留节点并异步执行 `work`。
    ///
    /// 预留失败时返回 `started = false`，此时没有获取任何东西，无需释放。
    pub async fn start<F, Fut>(&mut self, max_age: Duration, work: F) -> ScheduledWork
    where
        F: FnOnce(ActiveWorkSession) -> Fut + Send + 'static,
        Fut: Future<Output = LedgerResult<()>> + Send + 'static,
    {
        if self.state() != WorkSessionState::Created {
            warn!(
                "工作会话 {} 已处于 {:?} 状态，忽略重复的启动请求",
                self.id,
                self.state()
            );
            return ScheduledWork::declined();
        }

        self.max_age = max_age;
        let now = now_millis();
        self.state.send_replace(WorkSessionState::Reserving);

        if !self.reserve(now).await {
            self.state.send_replace(WorkSessionState::RejectedReservation);
            return ScheduledWork::declined();
        }

        let start_time = Utc
            .timestamp_millis_opt(now)
            .single()
            .unwrap_or_else(Utc::now);
        self.start_time = Some(start_time);
        self.started = true;
        self.state.send_replace(WorkSessionState::Reserved);

        let active = ActiveWorkSession {
            id: self.id.clone(),
            scheduler_id: self.scheduler_id.clone(),
            ledger_node_id: self.ledger_node_id.clone(),
            start_time,
            max_age,
        };
        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let (finished_tx, finished_rx) = oneshot::channel();

        info!(
            event = "work_session_started",
            session.id = %active.id,
            scheduler.id = %active.scheduler_id,
            ledger_node.id = %active.ledger_node_id,
            max_age_ms = max_age.as_millis() as u64,
            "工作会话已启动"
        );

        state.send_replace(WorkSessionState::Running);
        tokio::spawn(async move {
            let session = active.clone();
            let outcome = AssertUnwindSafe(async move { work(session).await })
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(
                        event = "work_failed",
                        session.id = %active.id,
                        scheduler.id = %active.scheduler_id,
                        ledger_node.id = %active.ledger_node_id,
                        error = %e,
                        "工作函数返回错误"
                    );
                    Err(e)
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(
                        event = "work_failed",
                        session.id = %active.id,
                        scheduler.id = %active.scheduler_id,
                        ledger_node.id = %active.ledger_node_id,
                        error = %message,
                        "工作函数发生panic"
                    );
                    Err(LedgerError::WorkFailed(message))
                }
            };

            let released = release_lease(store.as_ref(), &active.ledger_node_id, &active.id).await;
            state.send_replace(WorkSessionState::Released);
            let _ = finished_tx.send(WorkOutcome { result, released });
        });

        ScheduledWork {
            started: true,
            finished: WorkFinished {
                receiver: Some(finished_rx),
            },
        }
    }

    async fn reserve(&self, now: i64) -> bool {
        let expires = now
            .saturating_add(duration_millis(self.max_age))
            .saturating_add(duration_millis(self.grace_period));

        match self
            .store
            .try_convert_claim(&self.ledger_node_id, &self.scheduler_id, &self.id, expires)
            .await
        {
            Ok(true) => {
                debug!(
                    "工作会话 {} 预留节点 {} 成功，租约到期 {}",
                    self.id, self.ledger_node_id, expires
                );
                true
            }
            Ok(false) => {
                debug!(
                    "工作会话 {} 预留节点 {} 失败：调度器声明已不属于 {}",
                    self.id, self.ledger_node_id, self.scheduler_id
                );
                false
            }
            Err(e) => {
                warn!(
                    "工作会话 {} 预留节点 {} 时存储出错: {}",
                    self.id, self.ledger_node_id, e
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for WorkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkSession")
            .field("id", &self.id)
            .field("scheduler_id", &self.scheduler_id)
            .field("ledger_node_id", &self.ledger_node_id)
            .field("max_age", &self.max_age)
            .field("start_time", &self.start_time)
            .field("started", &self.started)
            .field("state", &self.state())
            .finish()
    }
}

async fn release_lease(store: &dyn LeaseStore, ledger_node_id: &str, session_id: &str) -> bool {
    match store.release(ledger_node_id, session_id).await {
        Ok(true) => {
            info!(
                event = "work_session_released",
                session.id = session_id,
                ledger_node.id = ledger_node_id,
                "工作会话租约已释放"
            );
            true
        }
        Ok(false) => {
            warn!(
                "工作会话 {} 释放节点 {} 时租约已不属于本会话（可能已过期并被重新声明）",
                session_id, ledger_node_id
            );
            false
        }
        Err(e) => {
            // 租约会在到期后自行失效
            warn!(
                "工作会话 {} 释放节点 {} 的租约失败: {}",
                session_id, ledger_node_id, e
            );
            false
        }
    }
}

fn remaining_since(
    start_time: Option<DateTime<Utc>>,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Duration {
    let Some(start_time) = start_time else {
        return Duration::ZERO;
    };
    let elapsed = (now - start_time).to_std().unwrap_or(Duration::ZERO);
    max_age.saturating_sub(elapsed)
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::atomic::{AtomicBool, Ordering};

    mock! {
        pub Store {}

        #[async_trait]
        impl LeaseStore for Store {
            async fn find_least_recently_updated_idle(&self, now: i64) -> LedgerResult<Option<String>>;
            async fn try_claim(&self, ledger_node_id: &str, scheduler_id: &str, claim_expires: i64, now: i64) -> LedgerResult<bool>;
            async fn try_convert_claim(&self, ledger_node_id: &str, scheduler_id: &str, session_id: &str, worker_expires: i64) -> LedgerResult<bool>;
            async fn release(&self, ledger_node_id: &str, session_id: &str) -> LedgerResult<bool>;
            async fn release_claim(&self, ledger_node_id: &str, scheduler_id: &str) -> LedgerResult<bool>;
        }
    }

    #[test]
    fn test_remaining_since() {
        let start = Utc::now();
        let max_age = Duration::from_millis(1_000);

        assert_eq!(remaining_since(None, max_age, start), Duration::ZERO);
        assert_eq!(remaining_since(Some(start), max_age, start), max_age);
        assert_eq!(
            remaining_since(Some(start), max_age, start + chrono::Duration::milliseconds(400)),
            Duration::from_millis(600)
        );
        assert_eq!(
            remaining_since(Some(start), max_age, start + chrono::Duration::seconds(5)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_unstarted_session_is_expired() {
        let store = Arc::new(MockStore::new());
        let session = WorkSession::new("scheduler-1", "node-1", store, Duration::from_secs(1));
        assert!(session.is_expired());
        assert!(!session.is_started());
        assert_eq!(session.state(), WorkSessionState::Created);
    }

    #[tokio::test]
    async fn test_rejected_reservation_does_not_run_work() {
        let mut store = MockStore::new();
        store
            .expect_try_convert_claim()
            .returning(|_, _, _, _| Ok(false));
        store.expect_release().never();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_work = Arc::clone(&ran);

        let mut session =
            WorkSession::new("scheduler-1", "node-1", Arc::new(store), Duration::from_secs(1));
        let scheduled = session
            .start(Duration::from_secs(1), move |_| async move {
                ran_in_work.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(!scheduled.started);
        assert!(!ran.load(Ordering::SeqCst));
        assert!(!session.is_started());
        assert_eq!(session.state(), WorkSessionState::RejectedReservation);
        assert!(scheduled.finished.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_store_error_during_reservation_is_not_started() {
        let mut store = MockStore::new();
        store
            .expect_try_convert_claim()
            .returning(|_, _, _, _| Err(LedgerError::Storage("unavailable".to_string())));

        let mut session =
            WorkSession::new("scheduler-1", "node-1", Arc::new(store), Duration::from_secs(1));
        let scheduled = session
            .start(Duration::from_secs(1), |_| async { Ok(()) })
            .await;

        assert!(!scheduled.started);
    }

    #[tokio::test]
    async fn test_reservation_expiry_includes_grace_period() {
        let before = now_millis();
        let mut store = MockStore::new();
        store
            .expect_try_convert_claim()
            .withf(move |node, scheduler, _, expires| {
                node == "node-1"
                    && scheduler == "scheduler-1"
                    && *expires >= before + 1_500
                    && *expires <= now_millis() + 1_500
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));
        store.expect_release().times(1).returning(|_, _| Ok(true));

        let mut session = WorkSession::new(
            "scheduler-1",
            "node-1",
            Arc::new(store),
            Duration::from_millis(500),
        );
        let scheduled = session
            .start(Duration::from_millis(1_000), |_| async { Ok(()) })
            .await;

        assert!(scheduled.started);
        assert!(scheduled.finished.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_work_still_releases() {
        let mut store = MockStore::new();
        store
            .expect_try_convert_claim()
            .returning(|_, _, _, _| Ok(true));
        store
            .expect_release()
            .withf(|node, session| node == "node-1" && !session.is_empty())
            .times(1)
            .returning(|_, _| Ok(true));

        let mut session =
            WorkSession::new("scheduler-1", "node-1", Arc::new(store), Duration::ZERO);
        let mut state_rx = session.subscribe_state();
        let scheduled = session
            .start(Duration::from_secs(1), |_| async {
                Err(LedgerError::WorkFailed("consensus round failed".to_string()))
            })
            .await;

        assert!(scheduled.started);
        let result = scheduled.finished.wait().await;
        assert!(matches!(result, Err(LedgerError::WorkFailed(_))));
        state_rx
            .wait_for(|state| *state == WorkSessionState::Released)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_panicking_work_still_releases() {
        let mut store = MockStore::new();
        store
            .expect_try_convert_claim()
            .returning(|_, _, _, _| Ok(true));
        store.expect_release().times(1).returning(|_, _| Ok(true));

        let mut session =
            WorkSession::new("scheduler-1", "node-1", Arc::new(store), Duration::ZERO);
        let scheduled = session
            .start(Duration::from_secs(1), |_| async {
                if true {
                    panic!("plugin bug");
                }
                Ok(())
            })
            .await;

        let result = scheduled.finished.wait().await;
        match result {
            Err(LedgerError::WorkFailed(message)) => assert!(message.contains("plugin bug")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(session.state(), WorkSessionState::Released);
    }

    #[tokio::test]
    async fn test_work_sees_time_remaining() {
        let mut store = MockStore::new();
        store
            .expect_try_convert_claim()
            .returning(|_, _, _, _| Ok(true));
        store.expect_release().returning(|_, _| Ok(true));

        let mut session =
            WorkSession::new("scheduler-1", "node-1", Arc::new(store), Duration::ZERO);
        let scheduled = session
            .start(Duration::from_secs(60), |active| async move {
                if active.is_expired() || active.time_remaining() > Duration::from_secs(60) {
                    return Err(LedgerError::Internal("bad time budget".to_string()));
                }
                Ok(())
            })
            .await;

        assert!(scheduled.finished.wait().await.is_ok());
        assert!(session.start_time().is_some());
        assert_eq!(session.max_age(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_outcome_reports_whether_lease_was_released() {
        let mut store = MockStore::new();
        store
            .expect_try_convert_claim()
            .returning(|_, _, _, _| Ok(true));
        let mut releases = vec![
            Err(LedgerError::Storage("unavailable".to_string())),
            Ok(false),
            Ok(true),
        ];
        store
            .expect_release()
            .times(3)
            .returning(move |_, _| releases.pop().unwrap_or(Ok(false)));
        let store: Arc<dyn LeaseStore> = Arc::new(store);

        let mut released = Vec::new();
        for _ in 0..3 {
            let mut session =
                WorkSession::new("scheduler-1", "node-1", Arc::clone(&store), Duration::ZERO);
            let scheduled = session
                .start(Duration::from_secs(1), |_| async { Ok(()) })
                .await;
            let outcome = scheduled.finished.wait_outcome().await;
            assert!(outcome.result.is_ok());
            released.push(outcome.released);
        }

        assert_eq!(released, vec![true, false, false]);
        assert!(!WorkFinished::ready().wait_outcome().await.released);
    }

    #[tokio::test]
    async fn test_second_start_is_ignored() {
        let mut store = MockStore::new();
        store
            .expect_try_convert_claim()
            .times(1)
            .returning(|_, _, _, _| Ok(true));
        store.expect_release().returning(|_, _| Ok(true));

        let mut session =
            WorkSession::new("scheduler-1", "node-1", Arc::new(store), Duration::ZERO);
        let first = session
            .start(Duration::from_secs(1), |_| async { Ok(()) })
            .await;
        let second = session
            .start(Duration::from_secs(1), |_| async { Ok(()) })
            .await;

        assert!(first.started);
        assert!(!second.started);
        assert!(session.is_started());
        first.finished.wait().await.unwrap();
    }
}
