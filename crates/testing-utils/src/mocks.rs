//! Scripted consensus plugin adapters
//!
//! 适配器按固定脚本响应每次工作机会，并记录调用次数、完成次数、
//! 以及同一账本节点上同时运行的工作函数数量的峰值。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ledger_core::{
    ConsensusPluginAdapter, LedgerError, LedgerResult, ScheduledWork, WorkSession,
};

#[derive(Debug, Clone)]
pub enum AdapterScript {
    /// 接受工作，工作函数运行 `work_duration` 后成功返回
    Accept {
        max_age: Duration,
        work_duration: Duration,
    },
    /// 接受工作，工作函数返回错误
    AcceptAndFail { max_age: Duration },
    /// 接受工作，工作函数 panic
    AcceptAndPanic { max_age: Duration },
    Decline,
    /// `schedule_work` 本身返回错误
    Error,
}

#[derive(Default)]
struct Tracker {
    completed: AtomicUsize,
    max_overlap: AtomicUsize,
    running: Mutex<HashMap<String, usize>>,
    served: Mutex<Vec<String>>,
}

impl Tracker {
    fn enter(&self, ledger_node_id: &str) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        let count = running.entry(ledger_node_id.to_string()).or_insert(0);
        *count += 1;
        self.max_overlap.fetch_max(*count, Ordering::SeqCst);
        drop(running);

        self.served
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ledger_node_id.to_string());
    }

    fn exit(&self, ledger_node_id: &str, completed: bool) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = running.get_mut(ledger_node_id) {
            *count = count.saturating_sub(1);
        }
        if completed {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct ScriptedAdapter {
    script: AdapterScript,
    offers: AtomicUsize,
    tracker: Arc<Tracker>,
}

impl ScriptedAdapter {
    pub fn new(script: AdapterScript) -> Self {
        Self {
            script,
            offers: AtomicUsize::new(0),
            tracker: Arc::new(Tracker::default()),
        }
    }

    pub fn accepting(max_age: Duration) -> Self {
        Self::accepting_for(max_age, Duration::ZERO)
    }

    pub fn accepting_for(max_age: Duration, work_duration: Duration) -> Self {
        Self::new(AdapterScript::Accept {
            max_age,
            work_duration,
        })
    }

    pub fn declining() -> Self {
        Self::new(AdapterScript::Decline)
    }

    pub fn failing_work(max_age: Duration) -> Self {
        Self::new(AdapterScript::AcceptAndFail { max_age })
    }

    pub fn panicking_work(max_age: Duration) -> Self {
        Self::new(AdapterScript::AcceptAndPanic { max_age })
    }

    pub fn erroring() -> Self {
        Self::new(AdapterScript::Error)
    }

    /// `schedule_work` 被调用的次数
    pub fn offers(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    /// 工作函数正常结束或返回错误的次数（panic 不计入）
    pub fn completed(&self) -> usize {
        self.tracker.completed.load(Ordering::SeqCst)
    }

    /// 同一账本节点上同时运行的工作函数数量峰值
    pub fn max_overlap(&self) -> usize {
        self.tracker.max_overlap.load(Ordering::SeqCst)
    }

    /// 按开始顺序记录的账本节点ID
    pub fn served(&self) -> Vec<String> {
        self.tracker
            .served
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ConsensusPluginAdapter for ScriptedAdapter {
    async fn schedule_work(&self, session: &mut WorkSession) -> LedgerResult<ScheduledWork> {
        self.offers.fetch_add(1, Ordering::SeqCst);

        let tracker = self.tracker.clone();
        match self.script.clone() {
            AdapterScript::Decline => Ok(ScheduledWork::declined()),
            AdapterScript::Error => Err(LedgerError::Internal("脚本化适配器出错".to_string())),
            AdapterScript::Accept {
                max_age,
                work_duration,
            } => Ok(session
                .start(max_age, move |active| async move {
                    tracker.enter(&active.ledger_node_id);
                    tokio::time::sleep(work_duration).await;
                    tracker.exit(&active.ledger_node_id, true);
                    Ok(())
                })
                .await),
            AdapterScript::AcceptAndFail { max_age } => Ok(session
                .start(max_age, move |active| async move {
                    tracker.enter(&active.ledger_node_id);
                    tracker.exit(&active.ledger_node_id, true);
                    Err(LedgerError::WorkFailed("脚本化工作失败".to_string()))
                })
                .await),
            AdapterScript::AcceptAndPanic { max_age } => Ok(session
                .start(max_age, move |active| async move {
                    tracker.enter(&active.ledger_node_id);
                    tracker.exit(&active.ledger_node_id, false);
                    if !active.ledger_node_id.is_empty() {
                        panic!("脚本化工作 panic");
                    }
                    Ok(())
                })
                .await),
        }
    }
}
