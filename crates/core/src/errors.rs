use thiserror::Error;

/// 账本节点错误类型定义
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("存储不可用: {0}")]
    Storage(String),

    #[error("共识插件未注册: {name}")]
    NotRegistered { name: String },

    #[error("账本节点未找到: {id}")]
    LedgerNodeNotFound { id: String },

    #[error("账本节点已存在: {id}")]
    LedgerNodeExists { id: String },

    #[error("配置错误: {0}")]
    InvalidConfiguration(String),

    #[error("无法生成调度器标识: {0}")]
    Identity(String),

    #[error("工作执行失败: {0}")]
    WorkFailed(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl LedgerError {
    /// 存储层的瞬时故障，调用方应视为"未获取/未释放"并在下一轮重试
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Database(_) | LedgerError::Storage(_))
    }
}

/// 统一的Result类型
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(LedgerError::Storage("down".to_string()).is_transient());
        assert!(!LedgerError::NotRegistered {
            name: "noop".to_string()
        }
        .is_transient());
        assert!(!LedgerError::WorkFailed("boom".to_string()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::LedgerNodeNotFound {
            id: "node-1".to_string(),
        };
        assert!(err.to_string().contains("node-1"));
    }
}
