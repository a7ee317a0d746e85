//! 协议常量定义

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 请求帧固定前缀
pub const PREFIX: u8 = 0x0C;

/// 响应帧固定前缀（按大端序读取：B1CB7400）
pub const PREFIX_RESP: u32 = 0xB1CB7400;

/// 响应帧头长度
pub const RESPONSE_HEADER_LEN: usize = 16;

/// 默认端口
pub const DEFAULT_PORT: u16 = 7709;

/// 单次请求上限
pub const MAX_QUOTE_CODES: usize = 80;
pub const MAX_KLINE_COUNT: u16 = 800;
pub const MAX_CODE_COUNT: u16 = 1000;
pub const MAX_MINUTE_TRADE_COUNT: u16 = 1800;
pub const MAX_HISTORY_TRADE_COUNT: u16 = 2000;

/// 消息类型常量
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Connect = 0x000D,            // 建立连接
    Heart = 0x0004,              // 心跳
    Count = 0x044E,              // 获取股票数量
    Code = 0x0450,               // 获取股票代码
    Quote = 0x053E,              // 行情信息
    Minute = 0x051D,             // 分时数据
    MinuteTrade = 0x0FC5,        // 分时交易
    HistoryMinute = 0x0FB4,      // 历史分时数据
    HistoryMinuteTrade = 0x0FB5, // 历史分时交易
    Kline = 0x052D,              // K线图
}

impl MessageType {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x000D => Some(MessageType::Connect),
            0x0004 => Some(MessageType::Heart),
            0x044E => Some(MessageType::Count),
            0x0450 => Some(MessageType::Code),
            0x053E => Some(MessageType::Quote),
            0x051D => Some(MessageType::Minute),
            0x0FC5 => Some(MessageType::MinuteTrade),
            0x0FB4 => Some(MessageType::HistoryMinute),
            0x0FB5 => Some(MessageType::HistoryMinuteTrade),
            0x052D => Some(MessageType::Kline),
            _ => None,
        }
    }
}

/// K线类型
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineType {
    Minute5 = 0,
    Minute15 = 1,
    Minute30 = 2,
    Minute60 = 3,
    Day2 = 4, // 日K线（分钟级编码）
    Week = 5,
    Month = 6,
    Minute = 7,
    Minute2 = 8,
    Day = 9,
    Quarter = 10,
    Year = 11,
}

impl KlineType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 分钟级K线：时间为压缩日期+分钟，成交量需除以100
    pub fn is_minute_class(self) -> bool {
        matches!(
            self,
            KlineType::Minute
                | KlineType::Minute2
                | KlineType::Minute5
                | KlineType::Minute15
                | KlineType::Minute30
                | KlineType::Minute60
                | KlineType::Day2
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            KlineType::Minute5 => "5分钟",
            KlineType::Minute15 => "15分钟",
            KlineType::Minute30 => "30分钟",
            KlineType::Minute60 => "60分钟",
            KlineType::Day2 => "日线2",
            KlineType::Week => "周线",
            KlineType::Month => "月线",
            KlineType::Minute => "1分钟",
            KlineType::Minute2 => "1分钟2",
            KlineType::Day => "日线",
            KlineType::Quarter => "季线",
            KlineType::Year => "年线",
        }
    }
}

/// 交易所类型
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    SZ = 0, // 深圳交易所
    SH = 1, // 上海交易所
    BJ = 2, // 北京交易所
}

impl Exchange {
    pub const ALL: [Exchange; 3] = [Exchange::SH, Exchange::SZ, Exchange::BJ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Exchange::SZ),
            1 => Some(Exchange::SH),
            2 => Some(Exchange::BJ),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Exchange::SZ => "sz",
            Exchange::SH => "sh",
            Exchange::BJ => "bj",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Exchange::SH => "上海",
            Exchange::SZ => "深圳",
            Exchange::BJ => "北京",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sh" => Ok(Exchange::SH),
            "sz" => Ok(Exchange::SZ),
            "bj" => Ok(Exchange::BJ),
            _ => Err(format!("未知交易所: {}", s)),
        }
    }
}

/// 控制码
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Control01 = 0x01,
}

impl Control {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
