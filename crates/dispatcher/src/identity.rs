use std::fmt;

use ledger_core::{LedgerError, LedgerResult};
use uuid::Uuid;

/// 调度器身份，写入调度器声明的租约ID
///
/// 格式为 `<hostname>-<uuid>`，同一主机上的多个调度器也不会重复。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerIdentity {
    id: String,
}

impl SchedulerIdentity {
    /// 获取主机名失败是调度器唯一的致命错误
    pub fn generate() -> LedgerResult<Self> {
        let hostname = hostname::get()
            .map_err(|e| LedgerError::Identity(format!("获取主机名失败: {e}")))?
            .into_string()
            .map_err(|raw| LedgerError::Identity(format!("主机名不是有效的UTF-8: {raw:?}")))?;

        Self::with_hostname(&hostname)
    }

    pub fn with_hostname(hostname: &str) -> LedgerResult<Self> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Err(LedgerError::Identity("主机名为空".to_string()));
        }
        Ok(Self {
            id: format!("{}-{}", hostname, Uuid::new_v4()),
        })
    }

    /// 使用固定ID，主要用于测试
    pub fn from_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for SchedulerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_unique_per_instance() {
        let a = SchedulerIdentity::with_hostname("ledger-host").unwrap();
        let b = SchedulerIdentity::with_hostname("ledger-host").unwrap();

        assert!(a.as_str().starts_with("ledger-host-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_hostname_is_rejected() {
        assert!(matches!(
            SchedulerIdentity::with_hostname("  "),
            Err(LedgerError::Identity(_))
        ));
    }

    #[test]
    fn test_generate_uses_local_hostname() {
        let identity = SchedulerIdentity::generate().unwrap();
        assert!(identity.as_str().len() > 36);
    }
}
