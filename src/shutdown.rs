//! 进程关闭
//!
//! 关闭信号只触发一次；收到信号后请求调度器退出，并在限定时间内等待
//! 当前一轮结束。超时未结束的工作会话不会被中断，它持有的租约在到期后失效。

use std::sync::Arc;
use std::time::Duration;

use ledger_dispatcher::Scheduler;
use tokio::sync::watch;
use tracing::{info, warn};

/// 停止调度器的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Exited,
    TimedOut,
}

#[derive(Clone)]
pub struct ShutdownManager {
    requested: Arc<watch::Sender<bool>>,
    stop_timeout: Duration,
}

/// 关闭信号的接收端
pub struct ShutdownSignal {
    requested: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// 等待关闭信号；管理器被丢弃时同样视为关闭
    pub async fn recv(&mut self) {
        let _ = self.requested.wait_for(|requested| *requested).await;
    }
}

impl ShutdownManager {
    pub fn new(stop_timeout: Duration) -> Self {
        let (requested, _) = watch::channel(false);
        Self {
            requested: Arc::new(requested),
            stop_timeout,
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    /// 订阅关闭信号；在关闭之后订阅会立即收到信号
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            requested: self.requested.subscribe(),
        }
    }

    /// 触发关闭，只有第一次调用返回 `true`
    pub fn shutdown(&self) -> bool {
        let first = self.requested.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        });

        if first {
            info!("触发系统关闭");
        }
        first
    }

    pub fn is_shutdown(&self) -> bool {
        *self.requested.borrow()
    }

    /// 请求调度器退出并等待，最多等待 `stop_timeout`
    pub async fn stop_scheduler(&self, scheduler: &Scheduler) -> StopOutcome {
        scheduler.request_exit();

        match tokio::time::timeout(self.stop_timeout, scheduler.wait_exited()).await {
            Ok(()) => {
                info!("调度器 {} 已停止", scheduler.id());
                StopOutcome::Exited
            }
            Err(_) => {
                warn!(
                    "调度器 {} 未在 {:?} 内退出，运行中的工作会话租约将在到期后失效",
                    scheduler.id(),
                    self.stop_timeout
                );
                StopOutcome::TimedOut
            }
        }
    }
}
