pub mod sqlite_ledger_node_store;

pub use sqlite_ledger_node_store::SqliteLedgerNodeStore;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use ledger_core::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS ledger_nodes (
        id TEXT PRIMARY KEY,
        consensus_method TEXT NOT NULL,
        deleted INTEGER NULL,
        work_session_id TEXT NULL,
        work_session_expires INTEGER NOT NULL DEFAULT -1,
        work_session_scheduler INTEGER NOT NULL DEFAULT 0,
        updated INTEGER NOT NULL,
        created INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_ledger_nodes_idle
        ON ledger_nodes (deleted, work_session_expires, updated)
    "#,
];

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("无效的数据库URL: {}", config.url))?
            .create_if_missing(true);

        // 内存数据库随连接销毁，只能保持单个常驻连接
        let in_memory = config.url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options
                .max_connections(config.max_connections)
                .max_lifetime(Duration::from_secs(1800))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("连接数据库失败: {}", config.url))?;

        info!("数据库连接池已创建: {}", config.url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("执行数据库迁移失败")?;
        }
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            connection_timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let manager = DatabaseManager::new(&memory_config()).await.unwrap();
        manager.migrate().await.unwrap();
        manager.migrate().await.unwrap();
        manager.health_check().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_nodes")
            .fetch_one(manager.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
        manager.close().await;
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let config = DatabaseConfig {
            url: format!("sqlite:{}", path.display()),
            max_connections: 2,
            connection_timeout_seconds: 5,
        };

        let manager = DatabaseManager::new(&config).await.unwrap();
        manager.migrate().await.unwrap();
        assert!(path.exists());
        manager.close().await;
    }
}
