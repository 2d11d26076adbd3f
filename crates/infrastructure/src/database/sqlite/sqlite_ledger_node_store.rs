use async_trait::async_trait;
use ledger_core::{
    models::{LedgerNodeRecord, WorkSessionLease, VACANT_EXPIRES},
    LeaseStore, LedgerError, LedgerNodeRepository, LedgerResult,
};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// 基于SQLite的账本节点存储
///
/// 每个租约操作都是一条带条件的 `UPDATE`，以受影响行数判断是否成功。
pub struct SqliteLedgerNodeStore {
    pool: SqlitePool,
}

impl SqliteLedgerNodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> LedgerResult<LedgerNodeRecord> {
        let work_session_id: Option<String> = row.try_get("work_session_id")?;
        let work_session_expires: i64 = row.try_get("work_session_expires")?;
        let work_session_scheduler: bool = row.try_get("work_session_scheduler")?;

        Ok(LedgerNodeRecord {
            id: row.try_get("id")?,
            consensus_method: row.try_get("consensus_method")?,
            deleted: row.try_get("deleted")?,
            work_session: WorkSessionLease {
                id: work_session_id,
                expires: work_session_expires,
                scheduler: work_session_scheduler,
            },
            updated: row.try_get("updated")?,
            created: row.try_get("created")?,
        })
    }
}

#[async_trait]
impl LeaseStore for SqliteLedgerNodeStore {
    async fn find_least_recently_updated_idle(&self, now: i64) -> LedgerResult<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT id FROM ledger_nodes
            WHERE deleted IS NULL AND work_session_expires <= $1
            ORDER BY updated ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        match row {
            Some(row) => Ok(Some(row.try_get("id")?)),
            None => Ok(None),
        }
    }

    async fn try_claim(
        &self,
        ledger_node_id: &str,
        scheduler_id: &str,
        claim_expires: i64,
        now: i64,
    ) -> LedgerResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ledger_nodes
            SET work_session_id = $1,
                work_session_expires = $2,
                work_session_scheduler = 1,
                updated = $3
            WHERE id = $4 AND deleted IS NULL AND work_session_expires <= $5
            "#,
        )
        .bind(scheduler_id)
        .bind(claim_expires)
        .bind(now)
        .bind(ledger_node_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        let claimed = result.rows_affected() == 1;
        if claimed {
            debug!("调度器 {} 声明节点 {}", scheduler_id, ledger_node_id);
        }
        Ok(claimed)
    }

    async fn try_convert_claim(
        &self,
        ledger_node_id: &str,
        scheduler_id: &str,
        session_id: &str,
        worker_expires: i64,
    ) -> LedgerResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ledger_nodes
            SET work_session_id = $1,
                work_session_expires = $2,
                work_session_scheduler = 0
            WHERE id = $3 AND deleted IS NULL AND work_session_id = $4
            "#,
        )
        .bind(session_id)
        .bind(worker_expires)
        .bind(ledger_node_id)
        .bind(scheduler_id)
        .execute(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, ledger_node_id: &str, session_id: &str) -> LedgerResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ledger_nodes
            SET work_session_id = NULL,
                work_session_expires = $1,
                work_session_scheduler = 0
            WHERE id = $2 AND work_session_id = $3
            "#,
        )
        .bind(VACANT_EXPIRES)
        .bind(ledger_node_id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, ledger_node_id: &str, scheduler_id: &str) -> LedgerResult<bool> {
        self.release(ledger_node_id, scheduler_id).await
    }
}

#[async_trait]
impl LedgerNodeRepository for SqliteLedgerNodeStore {
    async fn insert(&self, record: &LedgerNodeRecord) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_nodes (id, consensus_method, deleted, work_session_id,
                work_session_expires, work_session_scheduler, updated, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.consensus_method)
        .bind(record.deleted)
        .bind(&record.work_session.id)
        .bind(record.work_session.expires)
        .bind(record.work_session.scheduler)
        .bind(record.updated)
        .bind(record.created)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(LedgerError::LedgerNodeExists {
                    id: record.id.clone(),
                })
            }
            Err(e) => Err(LedgerError::Database(e)),
        }
    }

    async fn get(&self, ledger_node_id: &str) -> LedgerResult<Option<LedgerNodeRecord>> {
        let row = sqlx::query("SELECT * FROM ledger_nodes WHERE id = $1")
            .bind(ledger_node_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(LedgerError::Database)?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn list(&self, include_deleted: bool) -> LedgerResult<Vec<LedgerNodeRecord>> {
        let sql = if include_deleted {
            "SELECT * FROM ledger_nodes ORDER BY id ASC"
        } else {
            "SELECT * FROM ledger_nodes WHERE deleted IS NULL ORDER BY id ASC"
        };

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(LedgerError::Database)?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn mark_deleted(&self, ledger_node_id: &str, now: i64) -> LedgerResult<bool> {
        let result = sqlx::query(
            "UPDATE ledger_nodes SET deleted = $1, updated = $2 WHERE id = $3 AND deleted IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(ledger_node_id)
        .execute(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        Ok(result.rows_affected() == 1)
    }
}
