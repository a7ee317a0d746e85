//! 单个 TCP 会话
//!
//! 协议本身不支持并发请求，同一连接上的请求必须串行。会话用一把公平的
//! `tokio::sync::Mutex` 包住连接，持锁期间为 `Busy`，按获取顺序依次服务。
//! 读写超时或 I/O 错误会丢弃连接，并在有限次数内重连重试。

use crate::client::ClientError;
use crate::config::{with_default_port, ClientConfig};
use crate::protocol::*;
use log::{debug, info, warn};
use rand::Rng;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time;

/// 会话状态
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Ready = 2,
    Busy = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Ready,
            3 => SessionState::Busy,
            _ => SessionState::Disconnected,
        }
    }
}

pub struct Session {
    addr: String,
    config: ClientConfig,
    stream: Mutex<Option<TcpStream>>,
    state: AtomicU8,
    msg_id: AtomicU32,
}

impl Session {
    /// 连接并完成握手，失败直接返回，不重试
    pub async fn connect(addr: &str, config: &ClientConfig) -> Result<Self, ClientError> {
        let session = Self {
            addr: with_default_port(addr),
            config: config.clone(),
            stream: Mutex::new(None),
            state: AtomicU8::new(SessionState::Disconnected as u8),
            msg_id: AtomicU32::new(0),
        };

        let stream = session.open().await?;
        *session.stream.lock().await = Some(stream);
        session.set_state(SessionState::Ready);
        Ok(session)
    }

    /// 依次尝试多个地址，返回第一个连接成功的会话
    pub async fn connect_any<S: AsRef<str>>(
        hosts: &[S],
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        let mut last_error = None;
        for host in hosts {
            match Self::connect(host.as_ref(), config).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    warn!("连接 {} 失败: {}", host.as_ref(), e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ClientError::Other("没有可用的服务器地址".to_string())))
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn next_msg_id(&self) -> u32 {
        self.msg_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// 建立连接并发送连接请求
    async fn open(&self) -> Result<TcpStream, ClientError> {
        self.set_state(SessionState::Connecting);
        let result = async {
            let mut stream = time::timeout(self.config.dial_timeout, TcpStream::connect(&self.addr))
                .await
                .map_err(|_| ClientError::Timeout)??;
            stream.set_nodelay(true)?;

            let frame = Connect::request(self.next_msg_id());
            self.write_all(&mut stream, &frame.encode()).await?;
            let response = self.read_response(&mut stream).await?;
            match Connect::decode_response(response.data()) {
                Ok(info) => info!("已连接 {}: {}", self.addr, info.trim()),
                Err(_) => info!("已连接 {}", self.addr),
            }
            Ok::<_, ClientError>(stream)
        }
        .await;

        if result.is_err() {
            self.set_state(SessionState::Disconnected);
        }
        result
    }

    /// 发送请求帧并等待响应
    ///
    /// 消息ID由会话分配。传输错误时丢弃连接，按配置重连重试，
    /// 重试耗尽返回 [`ClientError::Transport`]。
    pub async fn send_frame(&self, mut frame: RequestFrame) -> Result<ResponseFrame, ClientError> {
        let mut guard = BusyGuard::enter(self, self.stream.lock().await);

        let mut attempt = 0u32;
        let result = loop {
            match self.try_once(&mut guard.slot, &mut frame).await {
                Ok(response) => break Ok(response),
                Err(e) if !e.is_transport() => break Err(e),
                Err(e) => {
                    if attempt >= self.config.reconnect_attempts {
                        warn!("{} 请求失败，已重试{}次: {}", self.addr, attempt, e);
                        break Err(ClientError::Transport {
                            attempts: attempt,
                            reason: e.to_string(),
                        });
                    }
                    attempt += 1;
                    let delay = self.reconnect_delay(attempt);
                    warn!(
                        "{} 请求失败: {}，{}ms 后第{}次重连",
                        self.addr,
                        e,
                        delay.as_millis(),
                        attempt
                    );
                    self.set_state(SessionState::Disconnected);
                    time::sleep(delay).await;
                }
            }
        };

        guard.finished = true;
        result
    }

    async fn try_once(
        &self,
        slot: &mut Option<TcpStream>,
        frame: &mut RequestFrame,
    ) -> Result<ResponseFrame, ClientError> {
        if slot.is_none() {
            *slot = Some(self.open().await?);
            self.set_state(SessionState::Busy);
        }
        let stream = slot.as_mut().ok_or(ClientError::Disconnected)?;

        let result = self.round_trip(stream, frame).await;
        if matches!(&result, Err(e) if e.is_transport()) {
            *slot = None;
        }
        result
    }

    async fn round_trip(
        &self,
        stream: &mut TcpStream,
        frame: &mut RequestFrame,
    ) -> Result<ResponseFrame, ClientError> {
        frame.msg_id = self.next_msg_id();
        self.write_all(stream, &frame.encode()).await?;
        let response = self.read_response(stream).await?;

        if response.msg_id() != frame.msg_id {
            return Err(ClientError::MsgIdMismatch {
                expected: frame.msg_id,
                actual: response.msg_id(),
            });
        }
        if response.msg_type() != frame.msg_type {
            return Err(ClientError::MsgTypeMismatch {
                expected: frame.msg_type,
                actual: response.msg_type(),
            });
        }
        Ok(response)
    }

    async fn write_all(&self, stream: &mut TcpStream, data: &[u8]) -> Result<(), ClientError> {
        debug!("发送请求帧 ({} 字节): {:02X?}", data.len(), data);
        let fut = async {
            stream.write_all(data).await?;
            stream.flush().await
        };
        match time::timeout(self.config.write_timeout, fut).await {
            Ok(res) => res.map_err(ClientError::from),
            Err(_) => Err(ClientError::Timeout),
        }
    }

    async fn read_response(&self, stream: &mut TcpStream) -> Result<ResponseFrame, ClientError> {
        let fut = async {
            let mut header = [0u8; RESPONSE_HEADER_LEN];
            stream.read_exact(&mut header).await?;
            let header = ResponseHeader::decode(&header)?;

            let mut body = vec![0u8; header.zip_length as usize];
            stream.read_exact(&mut body).await?;

            debug!(
                "接收响应: 类型={:?}, 压缩长度={}, 长度={}",
                header.msg_type, header.zip_length, header.length
            );
            Ok::<_, ClientError>(ResponseFrame::from_parts(header, body)?)
        };

        match time::timeout(self.config.read_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(ClientError::Timeout),
        }
    }

    /// 指数退避，附加最多1/4的随机抖动
    fn reconnect_delay(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_for(attempt);
        let max_jitter = base.as_millis() as u64 / 4;
        let jitter = if max_jitter > 0 {
            rand::thread_rng().gen_range(0..=max_jitter)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }

    /// 关闭连接，之后的请求会重新连接
    pub async fn close(&self) {
        let mut slot = self.stream.lock().await;
        if let Some(mut stream) = slot.take() {
            let _ = stream.shutdown().await;
            info!("已断开 {}", self.addr);
        }
        self.set_state(SessionState::Disconnected);
    }
}

/// 持锁期间的会话状态
///
/// 请求未完成就被丢弃（调用方取消）时，连接上可能还有未读的响应，
/// 此时丢弃连接，下次请求重新连接。
struct BusyGuard<'a> {
    session: &'a Session,
    slot: MutexGuard<'a, Option<TcpStream>>,
    finished: bool,
}

impl<'a> BusyGuard<'a> {
    fn enter(session: &'a Session, slot: MutexGuard<'a, Option<TcpStream>>) -> Self {
        session.set_state(SessionState::Busy);
        Self {
            session,
            slot,
            finished: false,
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.finished && self.slot.take().is_some() {
            debug!("{} 请求被取消，丢弃连接", self.session.addr);
        }
        self.session.set_state(if self.slot.is_some() {
            SessionState::Ready
        } else {
            SessionState::Disconnected
        });
    }
}
