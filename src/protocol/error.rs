//! 消息编解码错误

use thiserror::Error;

/// 消息编解码错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("数据长度不足")]
    InsufficientData,
    #[error("记录不完整: 声明 {count} 条, 第 {index} 条数据不足")]
    TruncatedRecord { index: u16, count: u16 },
    #[error("无效的股票代码: {0}")]
    InvalidCode(String),
    #[error("时间解析失败: {0}")]
    TimestampParse(String),
    #[error("无效的请求参数: {0}")]
    InvalidRequest(String),
    #[error("解析错误: {0}")]
    ParseError(String),
}

impl MessageError {
    /// 循环内的数据不足统一转换为记录截断
    pub(crate) fn in_record(self, index: u16, count: u16) -> Self {
        match self {
            MessageError::InsufficientData => MessageError::TruncatedRecord { index, count },
            other => other,
        }
    }
}
