//! 账本节点调度器
//!
//! 一个进程可以运行多个 [`Scheduler`] 实例，它们只通过租约存储协调。

pub mod cooldown;
pub mod identity;
pub mod scheduler;

pub use cooldown::Cooldown;
pub use identity::SchedulerIdentity;
pub use scheduler::Scheduler;
