use std::sync::Arc;

use futures::future::join_all;
use ledger_core::{models::LedgerNodeRecord, DatabaseConfig};
use ledger_infrastructure::{build_stores, LedgerNodeStores};

async fn memory_stores() -> LedgerNodeStores {
    build_stores(&DatabaseConfig {
        url: DatabaseConfig::IN_MEMORY.to_string(),
        ..DatabaseConfig::default()
    })
    .await
    .unwrap()
}

async fn sqlite_stores() -> LedgerNodeStores {
    build_stores(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    })
    .await
    .unwrap()
}

async fn all_stores() -> Vec<(&'static str, LedgerNodeStores)> {
    vec![("memory", memory_stores().await), ("sqlite", sqlite_stores().await)]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_exactly_one_winner() {
    for (backend, stores) in all_stores().await {
        stores
            .nodes
            .insert(&LedgerNodeRecord::new("node-a", "noop", 0))
            .await
            .unwrap();

        let attempts = (0..16).map(|i| {
            let leases = Arc::clone(&stores.leases);
            tokio::spawn(async move {
                leases
                    .try_claim("node-a", &format!("sched-{i}"), 10_000, 100)
                    .await
                    .unwrap()
            })
        });

        let winners = join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1, "backend {backend}");
    }
}

#[tokio::test]
async fn claim_hands_off_to_exactly_one_session() {
    for (backend, stores) in all_stores().await {
        stores
            .nodes
            .insert(&LedgerNodeRecord::new("node-a", "noop", 0))
            .await
            .unwrap();
        assert!(stores.leases.try_claim("node-a", "sched-1", 1_000, 10).await.unwrap());

        assert!(stores
            .leases
            .try_convert_claim("node-a", "sched-1", "session-1", 5_000)
            .await
            .unwrap());
        // 声明已被转换，第二次转换必须失败
        assert!(
            !stores
                .leases
                .try_convert_claim("node-a", "sched-1", "session-2", 5_000)
                .await
                .unwrap(),
            "backend {backend}"
        );

        let record = stores.nodes.get("node-a").await.unwrap().unwrap();
        assert!(record.work_session.is_held_by("session-1"));
        assert!(!record.work_session.scheduler);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_handoffs_have_exactly_one_winner() {
    for (backend, stores) in all_stores().await {
        stores
            .nodes
            .insert(&LedgerNodeRecord::new("node-a", "noop", 0))
            .await
            .unwrap();
        assert!(stores.leases.try_claim("node-a", "sched-1", 1_000, 10).await.unwrap());

        let handoffs = (0..8).map(|i| {
            let leases = Arc::clone(&stores.leases);
            tokio::spawn(async move {
                let session_id = format!("session-{i}");
                let won = leases
                    .try_convert_claim("node-a", "sched-1", &session_id, 5_000)
                    .await
                    .unwrap();
                (session_id, won)
            })
        });

        let winners: Vec<String> = join_all(handoffs)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|(_, won)| *won)
            .map(|(session_id, _)| session_id)
            .collect();
        assert_eq!(winners.len(), 1, "backend {backend}");

        let record = stores.nodes.get("node-a").await.unwrap().unwrap();
        assert!(record.work_session.is_held_by(&winners[0]), "backend {backend}");
        assert!(!record.work_session.scheduler);
    }
}

#[tokio::test]
async fn expired_lease_is_reclaimed_without_release() {
    for (backend, stores) in all_stores().await {
        stores
            .nodes
            .insert(&LedgerNodeRecord::new("node-a", "noop", 0))
            .await
            .unwrap();
        assert!(stores.leases.try_claim("node-a", "sched-1", 100, 10).await.unwrap());
        assert!(stores
            .leases
            .try_convert_claim("node-a", "sched-1", "crashed-session", 200)
            .await
            .unwrap());

        assert!(!stores.leases.try_claim("node-a", "sched-2", 500, 199).await.unwrap());
        assert!(
            stores.leases.try_claim("node-a", "sched-2", 500, 200).await.unwrap(),
            "backend {backend}"
        );

        // 旧会话迟到的释放不能清除新的声明
        assert!(!stores.leases.release("node-a", "crashed-session").await.unwrap());
        let record = stores.nodes.get("node-a").await.unwrap().unwrap();
        assert!(record.work_session.is_held_by("sched-2"));
    }
}

#[tokio::test]
async fn release_is_idempotent() {
    for (backend, stores) in all_stores().await {
        stores
            .nodes
            .insert(&LedgerNodeRecord::new("node-a", "noop", 0))
            .await
            .unwrap();
        assert!(stores.leases.try_claim("node-a", "sched-1", 100, 10).await.unwrap());
        assert!(stores
            .leases
            .try_convert_claim("node-a", "sched-1", "session-1", 1_000)
            .await
            .unwrap());

        assert!(stores.leases.release("node-a", "session-1").await.unwrap());
        assert!(!stores.leases.release("node-a", "session-1").await.unwrap());
        assert!(!stores.leases.release("missing", "session-1").await.unwrap());

        let record = stores.nodes.get("node-a").await.unwrap().unwrap();
        assert!(record.work_session.id.is_none(), "backend {backend}");
        assert!(record.work_session.is_expired(0));
    }
}
