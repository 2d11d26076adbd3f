use std::time::Duration;

use tokio::sync::Notify;

/// 可被提前唤醒的冷却计时器
///
/// 在没有等待者时调用 [`Cooldown::interrupt`] 会保留一次唤醒，
/// 下一次冷却立即结束。
#[derive(Debug, Default)]
pub struct Cooldown {
    notify: Notify,
}

impl Cooldown {
    pub fn new() -> Self {
        Self::default()
    }

    /// 等待 `duration`；被提前唤醒时返回 `false`
    pub async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.notify.notified() => false,
        }
    }

    pub fn interrupt(&self) {
        self.notify.notify_one();
    }
}
