use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use ledger_core::AppConfig;
use ledger_infrastructure::init_observability;
use ledger_node::app::Application;
use ledger_node::shutdown::{ShutdownManager, StopOutcome};
use tokio::signal;
use tracing::{error, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("ledger-node")
        .version(env!("CARGO_PKG_VERSION"))
        .about("账本节点共识工作调度器")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，未指定时按默认路径查找"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let log_level = matches.get_one::<String>("log-level").map(String::as_str);
    let log_format = matches.get_one::<String>("log-format").map(String::as_str);

    let config = AppConfig::load(config_path).context("加载配置失败")?;

    init_observability(&config.observability, log_level, log_format)?;

    info!("启动账本节点");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let app = Arc::new(Application::new(config).await?);

    let shutdown_manager = ShutdownManager::new(SHUTDOWN_TIMEOUT);

    let app_handle = {
        let shutdown = shutdown_manager.clone();
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown).await })
    };

    wait_for_shutdown_signal().await?;

    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown();

    match app_handle.await {
        Ok(Ok(StopOutcome::Exited)) => info!("应用已优雅关闭"),
        Ok(Ok(StopOutcome::TimedOut)) => warn!("调度器未在 {:?} 内退出，强制退出", SHUTDOWN_TIMEOUT),
        Ok(Err(e)) => error!("应用运行失败: {e}"),
        Err(e) => error!("应用任务异常结束: {e}"),
    }

    info!("账本节点已退出");
    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("安装SIGTERM信号处理器失败")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("安装Ctrl+C信号处理器失败")?;
                info!("收到Ctrl+C信号");
            },
            _ = terminate.recv() => {
                info!("收到SIGTERM信号");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("安装Ctrl+C信号处理器失败")?;
        info!("收到Ctrl+C信号");
    }

    Ok(())
}
