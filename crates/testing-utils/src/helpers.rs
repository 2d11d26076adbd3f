//! Test helper utilities

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ledger_core::models::LedgerNodeRecord;
use ledger_infrastructure::{InMemoryLedgerNodeStore, LedgerNodeStores};
use tokio::time::sleep;

pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }

        false
    }

    /// 内存存储，同时返回具体类型以便测试切换故障开关
    pub async fn memory_stores(
        records: Vec<LedgerNodeRecord>,
    ) -> (Arc<InMemoryLedgerNodeStore>, LedgerNodeStores) {
        let store = Arc::new(InMemoryLedgerNodeStore::new());
        for record in &records {
            ledger_core::LedgerNodeRepository::insert(store.as_ref(), record)
                .await
                .unwrap_or_else(|e| panic!("插入测试记录失败: {e}"));
        }
        let stores = LedgerNodeStores {
            leases: store.clone(),
            nodes: store.clone(),
        };
        (store, stores)
    }
}
