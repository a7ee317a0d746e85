//! 客户端配置

use crate::dial::DEFAULT_HOSTS;
use crate::protocol::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 连接、超时与重连配置
///
/// 时间字段在 JSON 中以毫秒表示，缺省字段取默认值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 服务器地址，未带端口时使用 7709
    pub hosts: Vec<String>,
    /// 会话数量
    pub pool_size: usize,
    #[serde(with = "millis")]
    pub dial_timeout: Duration,
    #[serde(with = "millis")]
    pub read_timeout: Duration,
    #[serde(with = "millis")]
    pub write_timeout: Duration,
    /// 会话断开后的重连次数
    pub reconnect_attempts: u32,
    /// 首次重连等待时间，之后每次翻倍
    #[serde(with = "millis")]
    pub reconnect_backoff: Duration,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts: DEFAULT_HOSTS.iter().map(|h| h.to_string()).collect(),
            pool_size: 1,
            dial_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl ClientConfig {
    /// 从 JSON 字符串读取配置
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, attempts: u32, backoff: Duration) -> Self {
        self.reconnect_attempts = attempts;
        self.reconnect_backoff = backoff;
        self
    }

    /// 第 attempt 次重连前的等待时间（从1开始），不含抖动
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.reconnect_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// 补全默认端口
pub fn with_default_port(host: &str) -> String {
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:{}", host, DEFAULT_PORT)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_partial() {
        let cfg = ClientConfig::from_json_str(
            r#"{"hosts": ["127.0.0.1:7709"], "pool_size": 4, "read_timeout": 1500}"#,
        )
        .unwrap();
        assert_eq!(cfg.hosts, vec!["127.0.0.1:7709".to_string()]);
        assert_eq!(cfg.pool_size, 4);
        assert_eq!(cfg.read_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.reconnect_attempts, 3);
        assert!(ClientConfig::from_json_str(r#"{"pool_size": "x"}"#).is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let cfg = ClientConfig::default().with_reconnect(5, Duration::from_millis(500));
        assert_eq!(cfg.backoff_for(1), Duration::from_millis(500));
        assert_eq!(cfg.backoff_for(2), Duration::from_secs(1));
        assert_eq!(cfg.backoff_for(4), Duration::from_secs(4));
        assert_eq!(cfg.backoff_for(10), Duration::from_secs(8));
    }

    #[test]
    fn default_port() {
        assert_eq!(with_default_port("1.2.3.4"), "1.2.3.4:7709");
        assert_eq!(with_default_port("1.2.3.4:80"), "1.2.3.4:80");
    }
}
