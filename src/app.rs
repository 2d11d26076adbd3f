use std::sync::Arc;

use anyhow::{Context, Result};
use ledger_core::{AppConfig, ConsensusRegistry, LedgerNodeService};
use ledger_dispatcher::{Scheduler, SchedulerIdentity};
use ledger_infrastructure::{build_stores, LedgerNodeStores, MetricsCollector};
use ledger_worker::{register_reference_plugins, InMemoryWorkSource};
use tracing::info;

use crate::shutdown::{ShutdownManager, StopOutcome};

/// 主应用程序
pub struct Application {
    config: AppConfig,
    stores: LedgerNodeStores,
    registry: Arc<ConsensusRegistry>,
    work_source: Arc<InMemoryWorkSource>,
    node_service: Arc<LedgerNodeService>,
    scheduler: Scheduler,
}

impl Application {
    /// 创建存储、注册内置插件并生成调度器身份
    ///
    /// 调度器只在存储就绪后创建；无法生成身份时返回错误，进程应当退出。
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let stores = build_stores(&config.database)
            .await
            .context("初始化账本节点存储失败")?;

        let registry = Arc::new(ConsensusRegistry::new());
        let work_source = Arc::new(InMemoryWorkSource::new());
        register_reference_plugins(&registry, work_source.clone()).await;

        let node_service = Arc::new(LedgerNodeService::new(
            stores.nodes.clone(),
            registry.clone(),
        ));

        let identity = SchedulerIdentity::generate().context("生成调度器身份失败")?;
        let metrics = Arc::new(MetricsCollector::new().context("创建指标收集器失败")?);

        let scheduler = Scheduler::new(
            identity,
            stores.leases.clone(),
            stores.nodes.clone(),
            registry.clone(),
            config.scheduler.clone(),
            metrics,
        );

        Ok(Self {
            config,
            stores,
            registry,
            work_source,
            node_service,
            scheduler,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn node_service(&self) -> Arc<LedgerNodeService> {
        self.node_service.clone()
    }

    pub fn work_source(&self) -> Arc<InMemoryWorkSource> {
        self.work_source.clone()
    }

    pub fn registry(&self) -> Arc<ConsensusRegistry> {
        self.registry.clone()
    }

    pub fn stores(&self) -> &LedgerNodeStores {
        &self.stores
    }

    /// 运行直到收到关闭信号，然后限时等待调度器退出
    pub async fn run(&self, shutdown: ShutdownManager) -> Result<StopOutcome> {
        let mut signal = shutdown.subscribe();

        if self.config.scheduler.enabled {
            info!("启动调度器: {}", self.scheduler.id());
            self.scheduler.start();
        } else {
            info!("调度器在配置中被禁用");
        }

        signal.recv().await;
        info!("应用收到关闭信号");

        Ok(shutdown.stop_scheduler(&self.scheduler).await)
    }
}
