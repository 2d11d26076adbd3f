use std::net::SocketAddr;

use anyhow::{Context, Result};
use ledger_core::ObservabilityConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::observability::structured_logger::{LogFormat, LoggingConfig};

pub fn init_structured_logging(config: LoggingConfig) -> Result<()> {
    let level = config.level.clone();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true);

            registry
                .with(fmt_layer)
                .try_init()
                .context("初始化日志系统失败")?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();

            registry
                .with(fmt_layer)
                .try_init()
                .context("初始化日志系统失败")?;
        }
    }

    info!(
        logging.format = ?config.format,
        logging.level = level,
        "日志系统初始化完成"
    );

    Ok(())
}

/// 安装 Prometheus 导出器，必须在 tokio 运行时内调用
pub fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {bind_address}"))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus导出器失败: {e}"))?;

    info!("Prometheus 指标导出器监听于 {}", addr);
    Ok(())
}

/// 按配置初始化日志与指标；`level`/`format` 覆盖配置文件中的值
pub fn init_observability(
    config: &ObservabilityConfig,
    level: Option<&str>,
    format: Option<&str>,
) -> Result<()> {
    let format_name = format.unwrap_or(&config.log_format);
    let format = LogFormat::parse(format_name)
        .ok_or_else(|| anyhow::anyhow!("不支持的日志格式: {format_name}"))?;

    init_structured_logging(LoggingConfig {
        level: level.unwrap_or(&config.log_level).to_string(),
        format,
    })?;

    if config.metrics_enabled {
        init_metrics(&config.metrics_bind_address)?;
    }

    Ok(())
}
