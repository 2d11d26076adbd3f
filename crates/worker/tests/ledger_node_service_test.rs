use std::sync::Arc;

use ledger_core::{ConsensusRegistry, LedgerError, LedgerNodeService};
use ledger_infrastructure::InMemoryLedgerNodeStore;
use ledger_worker::{register_reference_plugins, InMemoryWorkSource, NOOP_PLUGIN};

async fn service() -> LedgerNodeService {
    let registry = Arc::new(ConsensusRegistry::new());
    register_reference_plugins(&registry, Arc::new(InMemoryWorkSource::new())).await;
    LedgerNodeService::new(Arc::new(InMemoryLedgerNodeStore::new()), registry)
}

#[tokio::test]
async fn add_creates_idle_record() {
    let service = service().await;
    let record = service
        .add(Some("node-a".to_string()), NOOP_PLUGIN)
        .await
        .unwrap();

    assert_eq!(record.consensus_method, NOOP_PLUGIN);
    assert!(record.is_active());
    assert!(record.work_session.id.is_none());
    assert_eq!(service.get("node-a").await.unwrap(), record);
}

#[tokio::test]
async fn add_generates_id_when_missing() {
    let service = service().await;
    let record = service.add(None, NOOP_PLUGIN).await.unwrap();
    assert_eq!(record.id.len(), 36);
}

#[tokio::test]
async fn add_rejects_unknown_plugin_duplicates_and_blank_ids() {
    let service = service().await;

    assert!(matches!(
        service.add(Some("node-a".to_string()), "pbft").await,
        Err(LedgerError::NotRegistered { .. })
    ));

    service
        .add(Some("node-a".to_string()), NOOP_PLUGIN)
        .await
        .unwrap();
    assert!(matches!(
        service.add(Some("node-a".to_string()), NOOP_PLUGIN).await,
        Err(LedgerError::LedgerNodeExists { .. })
    ));

    assert!(matches!(
        service.add(Some("  ".to_string()), NOOP_PLUGIN).await,
        Err(LedgerError::InvalidConfiguration(_))
    ));
}

#[tokio::test]
async fn removed_nodes_disappear() {
    let service = service().await;
    service
        .add(Some("node-b".to_string()), NOOP_PLUGIN)
        .await
        .unwrap();
    service
        .add(Some("node-a".to_string()), NOOP_PLUGIN)
        .await
        .unwrap();

    let ids: Vec<String> = service
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["node-a", "node-b"]);

    service.remove("node-a").await.unwrap();
    assert!(matches!(
        service.get("node-a").await,
        Err(LedgerError::LedgerNodeNotFound { .. })
    ));
    assert!(matches!(
        service.remove("node-a").await,
        Err(LedgerError::LedgerNodeNotFound { .. })
    ));
    assert_eq!(service.list().await.unwrap().len(), 1);
}
