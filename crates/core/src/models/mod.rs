//! # 数据模型
//!
//! 账本节点记录及其工作会话租约。
//!
//! 所有时间字段均为 Unix 毫秒（`i64`），由调用方统一传入 `now`，
//! 使过期判断在同一个时钟下进行。
//!
//! ## 租约状态
//!
//! ```text
//! 空闲 {id: -1, expires: -1} 或 expires <= now
//!   → 调度器声明 {id: schedulerId, expires, scheduler: true}
//!   → Worker租约 {id: workSessionId, expires}
//!   → 空闲
//! ```

pub mod ledger_node;

pub use ledger_node::*;
