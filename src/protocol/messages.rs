//! 各种消息类型的编解码实现
//!
//! 每种消息提供 `request` 构造请求帧、`decode_response` 解析解压后的数据域。
//! 解码成功时 `list.len() == count`，任何一条记录解析失败都会放弃整个结果。

use crate::protocol::{
    code::{decode_code, price_denominator},
    codec::{
        cut_int, format_hour_minute, gbk_to_utf8, parse_date_minute, read_bytes, read_hour_minute,
        read_price, read_u16_le, read_u32_le, read_u8, read_volume, skip,
    },
    constants::{
        Exchange, KlineType, MessageType, MAX_HISTORY_TRADE_COUNT, MAX_KLINE_COUNT,
        MAX_MINUTE_TRADE_COUNT, MAX_QUOTE_CODES,
    },
    error::MessageError,
    frame::RequestFrame,
    types::{
        CodeResponse, Kline, KlineCache, KlineResponse, MinuteResponse, Price, PriceLevel,
        PriceNumber, QuoteInfo, StockCode, Trade, TradeCache, TradeResponse, TradeStatus, K,
    },
};
use bytes::BufMut;
use chrono::{NaiveDate, NaiveDateTime};

/// 分时/历史分时响应数量后的保留字节
const MINUTE_RESERVED: usize = 4;
/// 历史成交响应数量后的保留字节
const HISTORY_TRADE_RESERVED: usize = 4;
/// 连接响应前的保留字节
const CONNECT_RESERVED: usize = 68;
/// 代码列表每条记录长度
const CODE_RECORD_LEN: usize = 29;

/// 按声明数量循环解码，记录内数据不足转换为 `TruncatedRecord`
fn decode_records<'a, T, F>(
    mut bs: &'a [u8],
    count: u16,
    mut decode_one: F,
) -> Result<Vec<T>, MessageError>
where
    F: FnMut(&'a [u8], u16) -> Result<(&'a [u8], T), MessageError>,
{
    let mut list = Vec::with_capacity(count as usize);
    for i in 0..count {
        let (rest, item) = decode_one(bs, i).map_err(|e| e.in_record(i, count))?;
        bs = rest;
        list.push(item);
    }
    Ok(list)
}

/// 校验日期 YYYYMMDD，返回数值形式
pub fn parse_request_date(date: &str) -> Result<u32, MessageError> {
    if date.len() != 8 || NaiveDate::parse_from_str(date, "%Y%m%d").is_err() {
        return Err(MessageError::InvalidRequest(format!("无效的日期: {}", date)));
    }
    date.parse()
        .map_err(|_| MessageError::InvalidRequest(format!("无效的日期: {}", date)))
}

fn check_count(count: u16, max: u16) -> Result<(), MessageError> {
    if count > max {
        return Err(MessageError::InvalidRequest(format!(
            "单次数量不能超过{}",
            max
        )));
    }
    Ok(())
}

/// 交易所 + 0x00 + 代码
fn put_exchange_code(data: &mut Vec<u8>, exchange: Exchange, number: &str) {
    data.put_u8(exchange.as_u8());
    data.put_u8(0x00);
    data.put_slice(number.as_bytes());
}

// ==================== 连接 / 心跳 / 数量 ====================

/// 连接消息
pub struct Connect;

impl Connect {
    pub fn request(msg_id: u32) -> RequestFrame {
        RequestFrame::new(msg_id, MessageType::Connect, vec![0x01])
    }

    /// 前68字节未知，后续为GBK编码的服务器信息
    pub fn decode_response(data: &[u8]) -> Result<String, MessageError> {
        let rest = skip(data, CONNECT_RESERVED)?;
        Ok(gbk_to_utf8(rest))
    }
}

/// 心跳消息
pub struct Heartbeat;

impl Heartbeat {
    pub fn request(msg_id: u32) -> RequestFrame {
        RequestFrame::new(msg_id, MessageType::Heart, vec![])
    }
}

/// 获取股票数量消息
pub struct Count;

impl Count {
    pub fn request(msg_id: u32, exchange: Exchange) -> RequestFrame {
        let data = vec![exchange.as_u8(), 0x00, 0x75, 0xC7, 0x33, 0x01];
        RequestFrame::new(msg_id, MessageType::Count, data)
    }

    pub fn decode_response(data: &[u8]) -> Result<u16, MessageError> {
        read_u16_le(data).map(|(_, count)| count)
    }
}

// ==================== 代码列表 ====================

/// 获取股票代码列表消息（单次最多1000条）
pub struct Code;

impl Code {
    pub fn request(msg_id: u32, exchange: Exchange, start: u16) -> RequestFrame {
        let mut data = vec![exchange.as_u8(), 0x00];
        data.put_u16_le(start);
        RequestFrame::new(msg_id, MessageType::Code, data)
    }

    /// 每条29字节：代码(6) 倍数(2) 名称(8) 未知(4) 小数位(1) 昨收(4) 未知(4)
    pub fn decode_response(data: &[u8]) -> Result<CodeResponse, MessageError> {
        let (bs, count) = read_u16_le(data)?;
        if count == 0 {
            return Ok(CodeResponse { count, codes: Vec::new() });
        }

        let codes = decode_records(bs, count, |bs, _| {
            // 先整体校验长度，避免半条记录
            read_bytes(bs, CODE_RECORD_LEN)?;
            let (bs, code) = read_bytes(bs, 6)?;
            let (bs, multiple) = read_u16_le(bs)?;
            let (bs, name) = read_bytes(bs, 8)?;
            let bs = skip(bs, 4)?;
            let (bs, decimal) = read_u8(bs)?;
            let (bs, last_price) = read_volume(bs)?;
            let bs = skip(bs, 4)?;
            Ok((
                bs,
                StockCode {
                    name: gbk_to_utf8(name),
                    code: String::from_utf8_lossy(code).to_string(),
                    multiple,
                    decimal: decimal as i8,
                    last_price,
                },
            ))
        })?;

        Ok(CodeResponse { count, codes })
    }
}

// ==================== 行情 ====================

/// 行情信息消息（五档报价）
pub struct Quote;

impl Quote {
    pub fn request<S: AsRef<str>>(msg_id: u32, codes: &[S]) -> Result<RequestFrame, MessageError> {
        if codes.is_empty() {
            return Err(MessageError::InvalidRequest("股票代码列表不能为空".to_string()));
        }
        if codes.len() > MAX_QUOTE_CODES {
            return Err(MessageError::InvalidRequest(format!(
                "一次最多查询{}只股票",
                MAX_QUOTE_CODES
            )));
        }

        let mut data = vec![0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        data.put_u16_le(codes.len() as u16);
        for code in codes {
            let (exchange, number) = decode_code(code.as_ref())?;
            data.put_u8(exchange.as_u8());
            data.put_slice(number.as_bytes());
        }

        Ok(RequestFrame::new(msg_id, MessageType::Quote, data))
    }

    /// 前2字节未知，第3-4字节是数量
    pub fn decode_response(data: &[u8]) -> Result<Vec<QuoteInfo>, MessageError> {
        let bs = skip(data, 2)?;
        let (bs, count) = read_u16_le(bs)?;
        decode_records(bs, count, |bs, _| decode_quote(bs))
    }
}

fn decode_quote(bs: &[u8]) -> Result<(&[u8], QuoteInfo), MessageError> {
    let (bs, exchange_val) = read_u8(bs)?;
    let exchange = Exchange::from_u8(exchange_val)
        .ok_or_else(|| MessageError::ParseError(format!("无效的交易所: {}", exchange_val)))?;
    let (bs, code) = read_bytes(bs, 6)?;
    let code = gbk_to_utf8(code);
    let denominator = price_denominator(&code);
    let (bs, active1) = read_u16_le(bs)?;
    let (bs, k) = decode_k(bs, denominator)?;

    let (bs, server_time) = cut_int(bs)?;
    let (bs, _reversed1) = cut_int(bs)?;
    let (bs, total_hand) = cut_int(bs)?;
    let (bs, intuition) = cut_int(bs)?;
    let (bs, amount) = read_volume(bs)?;
    let (bs, inside_dish) = cut_int(bs)?;
    let (bs, outer_disc) = cut_int(bs)?;
    let (bs, _reversed2) = cut_int(bs)?;
    let (mut bs, _reversed3) = cut_int(bs)?;

    // 档位价格相对收盘价，按未缩放的原始值累加
    let close_raw = k.close.0 * denominator / 10;

    let mut buy_level = [PriceLevel { buy: true, price: Price(0), number: 0 }; 5];
    let mut sell_level = [PriceLevel { buy: false, price: Price(0), number: 0 }; 5];
    for i in 0..5 {
        let (rest, buy_diff) = read_price(bs)?;
        let (rest, sell_diff) = read_price(rest)?;
        let (rest, buy_num) = cut_int(rest)?;
        let (rest, sell_num) = cut_int(rest)?;
        buy_level[i].price = Price((close_raw + buy_diff.0) * 10) / denominator;
        buy_level[i].number = buy_num;
        sell_level[i].price = Price((close_raw + sell_diff.0) * 10) / denominator;
        sell_level[i].number = sell_num;
        bs = rest;
    }

    let mut bs = skip(bs, 2)?;
    for _ in 0..4 {
        let (rest, _) = cut_int(bs)?;
        bs = rest;
    }
    let (bs, rate_raw) = read_u16_le(bs)?;
    let (bs, active2) = read_u16_le(bs)?;

    Ok((
        bs,
        QuoteInfo {
            exchange,
            code,
            active1,
            k,
            server_time: server_time.to_string(),
            total_hand,
            intuition,
            amount,
            inside_dish,
            outer_disc,
            buy_level,
            sell_level,
            rate: rate_raw as f64 / 100.0,
            active2,
        },
    ))
}

/// 行情中的K线：收盘价为基准，其余为相对收盘价的差值，按证券类别的分母缩放
fn decode_k(bs: &[u8], denominator: i64) -> Result<(&[u8], K), MessageError> {
    let (bs, close_raw) = read_price(bs)?;
    let (bs, last_diff) = read_price(bs)?;
    let (bs, open_diff) = read_price(bs)?;
    let (bs, high_diff) = read_price(bs)?;
    let (bs, low_diff) = read_price(bs)?;

    let scale = |raw: i64| Price(raw * 10) / denominator;
    Ok((
        bs,
        K {
            last: scale(close_raw.0 + last_diff.0),
            open: scale(close_raw.0 + open_diff.0),
            high: scale(close_raw.0 + high_diff.0),
            low: scale(close_raw.0 + low_diff.0),
            close: scale(close_raw.0),
        },
    ))
}

// ==================== K线 ====================

/// K线数据消息（单次最多800条）
pub struct KlineMsg;

impl KlineMsg {
    pub fn request(
        msg_id: u32,
        kline_type: KlineType,
        code: &str,
        start: u16,
        count: u16,
    ) -> Result<RequestFrame, MessageError> {
        check_count(count, MAX_KLINE_COUNT)?;
        let (exchange, number) = decode_code(code)?;

        let mut data = Vec::with_capacity(30);
        put_exchange_code(&mut data, exchange, &number);
        data.put_u8(kline_type.as_u8());
        data.put_u8(0x00);
        data.put_slice(&[0x01, 0x00]);
        data.put_u16_le(start);
        data.put_u16_le(count);
        data.put_slice(&[0u8; 10]);

        Ok(RequestFrame::new(msg_id, MessageType::Kline, data))
    }

    /// 每条：时间(4) 开/收/高/低差值 成交量(4) 成交额(4) [指数: 上涨数(2) 下跌数(2)]
    ///
    /// 开盘价相对上一根收盘价累加，收/高/低相对本根开盘价。
    pub fn decode_response(data: &[u8], cache: KlineCache) -> Result<KlineResponse, MessageError> {
        let (bs, count) = read_u16_le(data)?;
        let mut last_close = Price(0);

        let list = decode_records(bs, count, |bs, _| {
            let (bs, time) = decode_kline_time(bs, cache.kline_type)?;
            let (bs, open_diff) = read_price(bs)?;
            let (bs, close_diff) = read_price(bs)?;
            let (bs, high_diff) = read_price(bs)?;
            let (bs, low_diff) = read_price(bs)?;

            let open = last_close + open_diff;
            let close = open + close_diff;
            let high = open + high_diff;
            let low = open + low_diff;

            let (bs, volume) = read_volume(bs)?;
            let mut volume = volume as i64;
            if cache.kline_type.is_minute_class() {
                volume /= 100;
            }
            let (mut bs, amount) = read_volume(bs)?;

            let (mut up_count, mut down_count) = (0, 0);
            if cache.is_index {
                let (rest, up) = read_u16_le(bs)?;
                let (rest, down) = read_u16_le(rest)?;
                up_count = up as i32;
                down_count = down as i32;
                volume *= 100;
                bs = rest;
            }

            let kline = Kline {
                last: last_close,
                open,
                high,
                low,
                close,
                order: 0,
                volume,
                amount: Price::from_yuan(amount),
                time,
                up_count,
                down_count,
            };
            last_close = close;
            Ok((bs, kline))
        })?;

        Ok(KlineResponse { count, list })
    }
}

/// 解码K线时间
///
/// 分钟级：前2字节为压缩日期 `(年-2004)<<11 | 月*100+日`，后2字节为分钟数；
/// 日线及以上：4字节 YYYYMMDD，时间取收盘 15:00。
fn decode_kline_time(bs: &[u8], kline_type: KlineType) -> Result<(&[u8], NaiveDateTime), MessageError> {
    let (rest, (year, month, day, hour, minute)) = if kline_type.is_minute_class() {
        let (rest, ymd) = read_u16_le(bs)?;
        let (rest, hm) = read_u16_le(rest)?;
        let year = (ymd >> 11) as i32 + 2004;
        let month = ((ymd % 2048) / 100) as u32;
        let day = ((ymd % 2048) % 100) as u32;
        (rest, (year, month, day, (hm / 60) as u32, (hm % 60) as u32))
    } else {
        let (rest, val) = read_u32_le(bs)?;
        let year = (val / 10000) as i32;
        let month = (val % 10000) / 100;
        let day = val % 100;
        (rest, (year, month, day, 15, 0))
    };

    let time = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| {
            MessageError::TimestampParse(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}",
                year, month, day, hour, minute
            ))
        })?;
    Ok((rest, time))
}

// ==================== 分时 ====================

/// 分时数据消息（当日）
pub struct MinuteMsg;

impl MinuteMsg {
    pub fn request(msg_id: u32, code: &str) -> Result<RequestFrame, MessageError> {
        let (exchange, number) = decode_code(code)?;

        let mut data = Vec::with_capacity(12);
        put_exchange_code(&mut data, exchange, &number);
        data.put_slice(&[0x00, 0x00, 0x00, 0x00]);

        Ok(RequestFrame::new(msg_id, MessageType::Minute, data))
    }

    /// 数量(2) 未知(4)，每条：价格差值 未知差值 成交量
    ///
    /// 第 i 条时间为 09:31 + i（上午120条），之后为 13:01 + (i - 120)。
    pub fn decode_response(data: &[u8], cache: &TradeCache) -> Result<MinuteResponse, MessageError> {
        let (bs, count) = read_u16_le(data)?;
        if count == 0 {
            return Ok(MinuteResponse { count, list: Vec::new() });
        }
        let (_, number) = decode_code(&cache.code)?;
        let denominator = price_denominator(&number);
        let bs = skip(bs, MINUTE_RESERVED)?;
        let mut last_price = Price(0);

        let list = decode_records(bs, count, |bs, i| {
            let (bs, price_diff) = read_price(bs)?;
            let (bs, _unknown) = read_price(bs)?;
            let (bs, number) = cut_int(bs)?;
            last_price += price_diff;

            let minutes = if i < 120 {
                9 * 60 + 30 + (i as u32 + 1)
            } else {
                11 * 60 + (i as u32 + 1)
            };
            let time = parse_date_minute(&cache.date, &format_hour_minute(minutes))?;

            Ok((
                bs,
                PriceNumber {
                    time,
                    price: Price(last_price.0 * 10) / denominator,
                    number,
                },
            ))
        })?;

        Ok(MinuteResponse { count, list })
    }
}

/// 历史分时数据消息
pub struct HistoryMinuteMsg;

impl HistoryMinuteMsg {
    /// date格式：YYYYMMDD
    pub fn request(msg_id: u32, date: &str, code: &str) -> Result<RequestFrame, MessageError> {
        let date_num = parse_request_date(date)?;
        let (exchange, number) = decode_code(code)?;

        let mut data = Vec::with_capacity(11);
        data.put_u32_le(date_num);
        data.put_u8(exchange.as_u8());
        data.put_slice(number.as_bytes());

        Ok(RequestFrame::new(msg_id, MessageType::HistoryMinute, data))
    }

    /// 与当日分时格式相同
    pub fn decode_response(data: &[u8], cache: &TradeCache) -> Result<MinuteResponse, MessageError> {
        MinuteMsg::decode_response(data, cache)
    }
}

// ==================== 分时成交 ====================

/// 分时成交消息（当日，单次最多1800条）
pub struct TradeMsg;

impl TradeMsg {
    pub fn request(msg_id: u32, code: &str, start: u16, count: u16) -> Result<RequestFrame, MessageError> {
        check_count(count, MAX_MINUTE_TRADE_COUNT)?;
        let (exchange, number) = decode_code(code)?;

        let mut data = Vec::with_capacity(12);
        put_exchange_code(&mut data, exchange, &number);
        data.put_u16_le(start);
        data.put_u16_le(count);

        Ok(RequestFrame::new(msg_id, MessageType::MinuteTrade, data))
    }

    /// 数量(2)，每条：时间(2) 价格差值 成交量 单数 状态 未知(恒为0)
    pub fn decode_response(data: &[u8], cache: &TradeCache) -> Result<TradeResponse, MessageError> {
        let (bs, count) = read_u16_le(data)?;
        if count == 0 {
            return Ok(TradeResponse { count, list: Vec::new() });
        }
        let (_, number) = decode_code(&cache.code)?;
        let denominator = price_denominator(&number);
        let mut last_price = Price(0);

        let list = decode_records(bs, count, |bs, _| {
            let (bs, hour_minute) = read_hour_minute(bs)?;
            let (bs, price_diff) = read_price(bs)?;
            let (bs, volume) = cut_int(bs)?;
            let (bs, number) = cut_int(bs)?;
            let (bs, status) = cut_int(bs)?;
            let (bs, _) = cut_int(bs)?;

            last_price += Price(price_diff.0 * 10);
            let time = parse_date_minute(&cache.date, &hour_minute)?;
            Ok((
                bs,
                Trade {
                    time,
                    price: last_price / denominator,
                    volume,
                    status: TradeStatus::from_raw(status),
                    number,
                },
            ))
        })?;

        Ok(TradeResponse { count, list })
    }
}

/// 历史分时成交消息（单次最多2000条）
pub struct HistoryTradeMsg;

impl HistoryTradeMsg {
    /// `日期(4) 交易所(1) 00 代码(6) 起始(2) 数量(2)`
    pub fn request(
        msg_id: u32,
        date: &str,
        code: &str,
        start: u16,
        count: u16,
    ) -> Result<RequestFrame, MessageError> {
        check_count(count, MAX_HISTORY_TRADE_COUNT)?;
        let date_num = parse_request_date(date)?;
        let (exchange, number) = decode_code(code)?;

        let mut data = Vec::with_capacity(16);
        data.put_u32_le(date_num);
        put_exchange_code(&mut data, exchange, &number);
        data.put_u16_le(start);
        data.put_u16_le(count);

        Ok(RequestFrame::new(msg_id, MessageType::HistoryMinuteTrade, data))
    }

    /// 数量(2) 未知(4)，每条：时间(2) 价格差值 成交量 状态 未知(恒为0)
    pub fn decode_response(data: &[u8], cache: &TradeCache) -> Result<TradeResponse, MessageError> {
        let (bs, count) = read_u16_le(data)?;
        if count == 0 {
            return Ok(TradeResponse { count, list: Vec::new() });
        }
        let (_, number) = decode_code(&cache.code)?;
        let denominator = price_denominator(&number);
        let bs = skip(bs, HISTORY_TRADE_RESERVED)?;
        let mut last_price = Price(0);

        let list = decode_records(bs, count, |bs, _| {
            let (bs, hour_minute) = read_hour_minute(bs)?;
            let (bs, price_diff) = read_price(bs)?;
            let (bs, volume) = cut_int(bs)?;
            let (bs, status) = cut_int(bs)?;
            let (bs, _) = cut_int(bs)?;

            last_price += Price(price_diff.0 * 10);
            let time = parse_date_minute(&cache.date, &hour_minute)?;
            Ok((
                bs,
                Trade {
                    time,
                    price: last_price / denominator,
                    volume,
                    status: TradeStatus::from_raw(status),
                    number: 0,
                },
            ))
        })?;

        Ok(TradeResponse { count, list })
    }
}
