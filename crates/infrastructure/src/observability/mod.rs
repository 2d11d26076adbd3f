//! Observability module
//!
//! - 结构化日志事件
//! - 调度器指标
//! - 日志与 Prometheus 导出器初始化

pub mod metrics_collector;
pub mod structured_logger;
pub mod telemetry_setup;

pub use metrics_collector::MetricsCollector;
pub use structured_logger::{LogFormat, LoggingConfig, StructuredLogger};
pub use telemetry_setup::{init_metrics, init_observability, init_structured_logging};
