//! 会话池
//!
//! 持有固定数量的会话，优先选择空闲会话，否则轮询。

use crate::client::ClientError;
use crate::config::ClientConfig;
use crate::protocol::{RequestFrame, ResponseFrame};
use crate::session::{Session, SessionState};
use log::info;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct Pool {
    sessions: Vec<Arc<Session>>,
    next: AtomicUsize,
}

impl Pool {
    /// 按配置建立 `pool_size` 个会话，每个会话连接到第一个可用地址
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let size = config.pool_size.max(1);
        let mut sessions = Vec::with_capacity(size);
        for _ in 0..size {
            sessions.push(Session::connect_any(&config.hosts[..], config).await?);
        }
        info!("连接池就绪，共 {} 个会话", sessions.len());
        Self::from_sessions(sessions)
    }

    pub fn from_sessions(sessions: Vec<Session>) -> Result<Self, ClientError> {
        if sessions.is_empty() {
            return Err(ClientError::Other("连接池不能为空".to_string()));
        }
        Ok(Self {
            sessions: sessions.into_iter().map(Arc::new).collect(),
            next: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.sessions.iter().map(|s| s.state()).collect()
    }

    /// 选择一个会话：优先空闲，否则轮询
    pub fn pick(&self) -> Arc<Session> {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        let n = self.sessions.len();
        let idle = (0..n)
            .map(|i| &self.sessions[(start + i) % n])
            .find(|s| s.state() == SessionState::Ready);
        match idle {
            Some(session) => session.clone(),
            None => self.sessions[start % n].clone(),
        }
    }

    pub async fn send_frame(&self, frame: RequestFrame) -> Result<ResponseFrame, ClientError> {
        self.pick().send_frame(frame).await
    }

    /// 关闭全部会话
    pub async fn close(&self) {
        for session in &self.sessions {
            session.close().await;
        }
    }
}
