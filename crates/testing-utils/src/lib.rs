//! # Ledger Testing Utils
//!
//! 各 crate 共享的测试工具：
//!
//! - **Builders**: 账本节点记录构造器
//! - **Mocks**: 按脚本行为接受或拒绝工作的共识插件适配器
//! - **Helpers**: 等待条件、准备存储
//!
//! ```toml
//! [dev-dependencies]
//! ledger-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
