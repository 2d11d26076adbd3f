//! 参考共识插件
//!
//! - `noop`: 接受每一次工作机会并立即完成
//! - `batch`: 有待处理工作时接受，在会话时间窗口内逐条处理

pub mod plugins;
pub mod work_source;

pub use plugins::{
    register_reference_plugins, BatchConsensusAdapter, NoopConsensusAdapter, BATCH_PLUGIN,
    NOOP_PLUGIN,
};
pub use work_source::{InMemoryWorkSource, WorkSource};
