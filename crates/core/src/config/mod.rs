//! 配置管理
//!
//! 默认值 → TOML 配置文件 → `LEDGER_` 前缀的环境变量，依次覆盖后统一校验。
//!
//! ```toml
//! [database]
//! url = "sqlite://ledger.db"
//! max_connections = 5
//! connection_timeout_seconds = 30
//!
//! [scheduler]
//! enabled = true
//! cooldown_ms = 1000
//! claim_ttl_ms = 30000
//! work_session_grace_period_ms = 30000
//! ```

pub mod models;

pub use models::*;
