//! 通达信行情协议客户端

pub mod client;
pub mod config;
pub mod dial;
pub mod directory;
pub mod pool;
pub mod protocol;
pub mod session;

pub use client::{Client, ClientError};
pub use config::ClientConfig;
pub use dial::{dial, dial_default, dial_hosts_random, dial_hosts_range, fast_hosts, DialResult};
pub use directory::{CodeModel, Directory};
pub use pool::Pool;
pub use protocol::*;
pub use session::{Session, SessionState};

// 重新导出 log 宏供用户使用
pub use log;
