use serde::{Deserialize, Serialize};

/// 租约存储配置
///
/// `url` 为 `memory` 时使用进程内存储，否则按 SQLite 连接串处理。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub const IN_MEMORY: &'static str = "memory";

    pub fn is_in_memory(&self) -> bool {
        self.url == Self::IN_MEMORY
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            return Err(anyhow::anyhow!("数据库URL不能为空"));
        }

        if !self.is_in_memory() && !self.url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!(
                "数据库URL必须是 `{}` 或 SQLite 格式: {}",
                Self::IN_MEMORY,
                self.url
            ));
        }

        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }

        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            connection_timeout_seconds: 30,
        }
    }
}
