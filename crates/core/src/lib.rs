//! 账本节点框架核心库
//!
//! 定义账本节点记录、租约存储契约、工作会话以及共识插件注册表。

pub mod config;
pub mod errors;
pub mod models;
pub mod registry;
pub mod services;
pub mod traits;
pub mod work_session;

pub use config::{AppConfig, DatabaseConfig, ObservabilityConfig, SchedulerConfig};
pub use errors::*;
pub use registry::ConsensusRegistry;
pub use services::LedgerNodeService;
pub use traits::{ConsensusPluginAdapter, LeaseStore, LedgerNodeRepository};
pub use work_session::{
    ActiveWorkSession, ScheduledWork, WorkFinished, WorkOutcome, WorkSession,
    WorkSessionState,
};
