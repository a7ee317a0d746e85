//! 服务器选择（异步）

use crate::client::{Client, ClientError};
use crate::config::{with_default_port, ClientConfig};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time;

/// 默认服务器地址列表
pub const DEFAULT_HOSTS: &[&str] = &[
    "124.71.187.122",
    "122.51.120.217",
    "111.229.247.189",
    "124.70.176.52",
    "123.60.186.45",
    "122.51.232.182",
    "118.25.98.114",
    "124.70.199.56",
    "121.36.225.169",
    "123.60.70.228",
    "123.60.73.44",
    "124.70.133.119",
];

/// 连接到指定地址
pub async fn dial(addr: &str) -> Result<Client, ClientError> {
    Client::connect(addr).await
}

/// 按顺序尝试地址列表，空列表时使用默认地址
pub async fn dial_hosts_range(hosts: &[&str]) -> Result<Client, ClientError> {
    let config = ClientConfig::default();
    let config = if hosts.is_empty() {
        config
    } else {
        config.with_hosts(hosts.iter().copied())
    };
    Client::with_config(&config).await
}

/// 打乱地址顺序后依次尝试，分散各客户端的连接
pub async fn dial_hosts_random(hosts: &[&str]) -> Result<Client, ClientError> {
    let mut shuffled: Vec<&str> = if hosts.is_empty() {
        DEFAULT_HOSTS.to_vec()
    } else {
        hosts.to_vec()
    };
    shuffled.shuffle(&mut StdRng::from_entropy());
    debug!("随机地址顺序: {:?}", shuffled);

    dial_hosts_range(&shuffled).await
}

/// 使用默认配置（遍历默认服务器列表）
pub async fn dial_default() -> Result<Client, ClientError> {
    Client::with_config(&ClientConfig::default()).await
}

/// 连接测速结果
#[derive(Debug, Clone)]
pub struct DialResult {
    pub host: String,
    pub duration: Duration,
}

/// 并发测试多个地址的 TCP 连接耗时，按耗时升序返回可达地址
pub async fn fast_hosts(hosts: &[&str], timeout: Duration) -> Vec<DialResult> {
    let hosts = if hosts.is_empty() { DEFAULT_HOSTS } else { hosts };

    let mut handles = Vec::new();
    for host in hosts {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            let addr = with_default_port(&host);
            let start = Instant::now();
            match time::timeout(timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(_)) => Some(DialResult {
                    host,
                    duration: start.elapsed(),
                }),
                _ => None,
            }
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        if let Ok(Some(result)) = handle.await {
            results.push(result);
        }
    }

    results.sort_by_key(|r| r.duration);
    results
}
