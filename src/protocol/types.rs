//! 协议数据类型定义

use crate::protocol::constants::{Exchange, KlineType};
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Div};

const TIME_FMT: &str = "%Y-%m-%d %H:%M";

/// 价格类型，单位为厘（1元 = 1000厘）
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(pub i64);

impl Price {
    pub fn from_yuan(yuan: f64) -> Self {
        Price((yuan * 1000.0).round() as i64)
    }

    pub fn to_yuan(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Price) {
        self.0 += rhs.0;
    }
}

impl Div<i64> for Price {
    type Output = Price;

    fn div(self, rhs: i64) -> Price {
        Price(self.0 / rhs)
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.to_yuan())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}元", self.to_yuan())
    }
}

/// 序列化为元
impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_yuan())
    }
}

/// 价格档位（5档买卖盘）
#[derive(Clone, Copy, Serialize)]
pub struct PriceLevel {
    pub buy: bool,
    pub price: Price,
    pub number: i32, // 数量（手）
}

impl fmt::Debug for PriceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.buy { "买" } else { "卖" };
        write!(f, "{}:{:.2}x{}", side, self.price.to_yuan(), self.number)
    }
}

/// 5档价格档位
pub type PriceLevels = [PriceLevel; 5];

/// 行情中的当日K线
#[derive(Clone, Serialize)]
pub struct K {
    pub last: Price,  // 昨天收盘价
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
}

impl fmt::Debug for K {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "K{{昨收:{:.2} 开:{:.2} 高:{:.2} 低:{:.2} 收:{:.2}}}",
            self.last.to_yuan(),
            self.open.to_yuan(),
            self.high.to_yuan(),
            self.low.to_yuan(),
            self.close.to_yuan()
        )
    }
}

/// K线数据项
#[derive(Clone, Serialize)]
pub struct Kline {
    pub last: Price,   // 上一根收盘价
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub order: i32,    // 成交单数
    pub volume: i64,   // 成交量
    pub amount: Price, // 成交额
    pub time: NaiveDateTime,
    pub up_count: i32,   // 上涨数量（指数有效）
    pub down_count: i32, // 下跌数量（指数有效）
}

impl fmt::Debug for Kline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} 昨收:{:.2} 开:{:.2} 高:{:.2} 低:{:.2} 收:{:.2} 量:{} 额:{:.0}",
            self.time.format(TIME_FMT),
            self.last.to_yuan(),
            self.open.to_yuan(),
            self.high.to_yuan(),
            self.low.to_yuan(),
            self.close.to_yuan(),
            self.volume,
            self.amount.to_yuan()
        )?;
        if self.up_count > 0 || self.down_count > 0 {
            write!(f, " 涨:{}/跌:{}", self.up_count, self.down_count)?;
        }
        Ok(())
    }
}

/// 分时数据项
#[derive(Clone, Serialize)]
pub struct PriceNumber {
    pub time: NaiveDateTime,
    pub price: Price,
    pub number: i32, // 成交量（手）
}

impl fmt::Debug for PriceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2} {}手",
            self.time.format("%H:%M"),
            self.price.to_yuan(),
            self.number
        )
    }
}

/// 分时成交数据项
#[derive(Clone, Serialize)]
pub struct Trade {
    pub time: NaiveDateTime,
    pub price: Price,
    pub volume: i32,         // 成交量（手）
    pub status: TradeStatus,
    pub number: i32,         // 单数（历史数据无效）
}

impl fmt::Debug for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2} {}手 {:?} 单数:{}",
            self.time.format(TIME_FMT),
            self.price.to_yuan(),
            self.volume,
            self.status,
            self.number
        )
    }
}

/// 成交状态
#[derive(Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeStatus {
    Buy = 0,
    Sell = 1,
    Neutral = 2, // 中性/汇总
}

impl TradeStatus {
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => TradeStatus::Buy,
            1 => TradeStatus::Sell,
            _ => TradeStatus::Neutral,
        }
    }
}

impl fmt::Debug for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Buy => write!(f, "买"),
            TradeStatus::Sell => write!(f, "卖"),
            TradeStatus::Neutral => write!(f, "中"),
        }
    }
}

/// 服务器返回的代码列表项
#[derive(Clone, Serialize)]
pub struct StockCode {
    pub name: String,
    pub code: String,
    pub multiple: u16,   // 倍数，基本是100
    pub decimal: i8,     // 小数点，基本是2
    pub last_price: f64, // 昨收价格（单位元，对个股无效，对指数有效）
}

impl fmt::Debug for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} 倍数:{} 小数:{}", self.code, self.name, self.multiple, self.decimal)?;
        if self.last_price > 0.0 {
            write!(f, " 昨收:{:.2}", self.last_price)?;
        }
        Ok(())
    }
}

/// 行情信息
#[derive(Clone, Serialize)]
pub struct QuoteInfo {
    pub exchange: Exchange,
    pub code: String,
    pub active1: u16, // 活跃度
    pub k: K,
    pub server_time: String,
    pub total_hand: i32, // 总手
    pub intuition: i32,  // 现量
    pub amount: f64,
    pub inside_dish: i32, // 内盘
    pub outer_disc: i32,  // 外盘
    pub buy_level: PriceLevels,
    pub sell_level: PriceLevels,
    pub rate: f64, // 涨速
    pub active2: u16,
}

impl fmt::Debug for QuoteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let change = self.k.close.to_yuan() - self.k.last.to_yuan();
        let change_pct = if self.k.last.0 != 0 {
            change / self.k.last.to_yuan() * 100.0
        } else {
            0.0
        };

        write!(
            f,
            "{}{} 现价:{:.2} 涨跌:{:+.2}({:+.2}%) 量:{}手 额:{:.0}万",
            self.exchange.as_str(),
            self.code,
            self.k.close.to_yuan(),
            change,
            change_pct,
            self.total_hand,
            self.amount / 10000.0
        )?;
        write!(
            f,
            " 开:{:.2} 高:{:.2} 低:{:.2} 昨收:{:.2}",
            self.k.open.to_yuan(),
            self.k.high.to_yuan(),
            self.k.low.to_yuan(),
            self.k.last.to_yuan()
        )?;
        write!(
            f,
            " 现量:{} 内盘:{} 外盘:{} 涨速:{:.2}",
            self.intuition, self.inside_dish, self.outer_disc, self.rate
        )?;

        let buy1 = &self.buy_level[0];
        let sell1 = &self.sell_level[0];
        if buy1.number > 0 || sell1.number > 0 {
            write!(
                f,
                " 买1:{:.2}x{} 卖1:{:.2}x{}",
                buy1.price.to_yuan(),
                buy1.number,
                sell1.price.to_yuan(),
                sell1.number
            )?;
        }
        Ok(())
    }
}

/// K线响应数据
#[derive(Clone, Serialize)]
pub struct KlineResponse {
    pub count: u16,
    pub list: Vec<Kline>,
}

/// 分时数据响应
#[derive(Clone, Serialize)]
pub struct MinuteResponse {
    pub count: u16,
    pub list: Vec<PriceNumber>,
}

/// 交易数据响应
#[derive(Clone, Serialize)]
pub struct TradeResponse {
    pub count: u16,
    pub list: Vec<Trade>,
}

/// 股票代码列表响应
#[derive(Debug, Clone, Serialize)]
pub struct CodeResponse {
    pub count: u16,
    pub codes: Vec<StockCode>,
}

fn fmt_list<T: fmt::Debug>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    count: u16,
    list: &[T],
) -> fmt::Result {
    writeln!(f, "{}({}):", title, count)?;
    for (i, item) in list.iter().take(10).enumerate() {
        writeln!(f, "  {:>3}. {:?}", i + 1, item)?;
    }
    if list.len() > 10 {
        writeln!(f, "  ... 还有 {} 条", list.len() - 10)?;
    }
    Ok(())
}

impl fmt::Debug for KlineResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_list(f, "K线数据", self.count, &self.list)
    }
}

impl fmt::Debug for MinuteResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_list(f, "分时数据", self.count, &self.list)
    }
}

impl fmt::Debug for TradeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_list(f, "交易数据", self.count, &self.list)
    }
}

/// K线解码上下文
#[derive(Clone, Copy)]
pub struct KlineCache {
    pub kline_type: KlineType,
    pub is_index: bool,
}

impl fmt::Debug for KlineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_index { "指数" } else { "股票" };
        write!(f, "{}K线({})", self.kline_type.name(), kind)
    }
}

/// 成交/分时解码上下文
#[derive(Debug, Clone)]
pub struct TradeCache {
    pub date: String, // 日期 YYYYMMDD
    pub code: String, // 股票代码
}

impl TradeCache {
    pub fn new(code: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            date: date.into(),
        }
    }
}
