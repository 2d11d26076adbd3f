use chrono::Utc;
use serde::{Deserialize, Serialize};

/// 空闲租约的过期时间哨兵值
pub const VACANT_EXPIRES: i64 = -1;

/// 当前时间（Unix毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 账本节点上的工作会话租约
///
/// 调度器声明与Worker租约共用同一字段，所有权从调度器转移给Worker而不是复制。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSessionLease {
    pub id: Option<String>,
    pub expires: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub scheduler: bool,
}

impl WorkSessionLease {
    /// 空租约 `{id: -1, expires: -1}`
    pub fn vacant() -> Self {
        Self {
            id: None,
            expires: VACANT_EXPIRES,
            scheduler: false,
        }
    }

    /// 调度器持有的短期声明
    pub fn scheduler_claim(scheduler_id: impl Into<String>, expires: i64) -> Self {
        Self {
            id: Some(scheduler_id.into()),
            expires,
            scheduler: true,
        }
    }

    /// Worker持有的工作租约
    pub fn worker(session_id: impl Into<String>, expires: i64) -> Self {
        Self {
            id: Some(session_id.into()),
            expires,
            scheduler: false,
        }
    }

    /// 过期判断只依赖时钟，不需要任何参与者显式解锁
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires <= now
    }

    pub fn is_held_by(&self, owner_id: &str) -> bool {
        self.id.as_deref() == Some(owner_id)
    }
}

impl Default for WorkSessionLease {
    fn default() -> Self {
        Self::vacant()
    }
}

/// 账本节点记录，每个账本节点一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerNodeRecord {
    pub id: String,
    pub consensus_method: String,
    /// `None` 表示活跃；否则为逻辑删除时间戳
    pub deleted: Option<i64>,
    pub work_session: WorkSessionLease,
    pub updated: i64,
    pub created: i64,
}

impl LedgerNodeRecord {
    pub fn new(id: impl Into<String>, consensus_method: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            consensus_method: consensus_method.into(),
            deleted: None,
            work_session: WorkSessionLease::vacant(),
            updated: now,
            created: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted.is_none()
    }

    /// 活跃且没有未过期的租约
    pub fn is_idle(&self, now: i64) -> bool {
        self.is_active() && self.work_session.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vacant_lease_is_expired() {
        let lease = WorkSessionLease::vacant();
        assert!(lease.is_expired(0));
        assert!(lease.id.is_none());
    }

    #[test]
    fn test_lease_expiry_boundary() {
        let lease = WorkSessionLease::worker("session-1", 1_000);
        assert!(!lease.is_expired(999));
        assert!(lease.is_expired(1_000));
        assert!(lease.is_held_by("session-1"));
        assert!(!lease.is_held_by("session-2"));
    }

    #[test]
    fn test_record_idle() {
        let mut record = LedgerNodeRecord::new("node-1", "noop", 100);
        assert!(record.is_idle(100));

        record.work_session = WorkSessionLease::scheduler_claim("scheduler-1", 200);
        assert!(!record.is_idle(150));
        assert!(record.is_idle(200));

        record.deleted = Some(300);
        assert!(!record.is_idle(400));
    }

    #[test]
    fn test_lease_serialization_shape() {
        let claim = WorkSessionLease::scheduler_claim("scheduler-1", 42);
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["id"], "scheduler-1");
        assert_eq!(json["expires"], 42);
        assert_eq!(json["scheduler"], true);

        let lease = WorkSessionLease::worker("session-1", 42);
        let json = serde_json::to_value(&lease).unwrap();
        assert!(json.get("scheduler").is_none());
    }
}
