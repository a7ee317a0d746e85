//! TDX 客户端（异步）
//!
//! 高层查询接口：构造请求帧，交给连接池发送，再按消息类型解码。

use crate::config::ClientConfig;
use crate::pool::Pool;
use crate::protocol::*;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use log::{debug, warn};
use std::io;

/// 客户端错误
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),
    #[error("协议错误: {0}")]
    Protocol(#[from] FrameError),
    #[error("消息错误: {0}")]
    Message(#[from] MessageError),
    #[error("超时")]
    Timeout,
    #[error("连接已关闭")]
    Disconnected,
    #[error("传输失败（重连{attempts}次）: {reason}")]
    Transport { attempts: u32, reason: String },
    #[error("消息ID不匹配: 期望 {expected}, 得到 {actual}")]
    MsgIdMismatch { expected: u32, actual: u32 },
    #[error("消息类型不匹配: 期望 {expected:?}, 得到 {actual:?}")]
    MsgTypeMismatch { expected: MessageType, actual: MessageType },
    #[error("不支持的市场: {0}")]
    UnsupportedMarket(String),
    #[error("其他错误: {0}")]
    Other(String),
}

impl ClientError {
    /// 连接层面的错误，丢弃连接后可以重试
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Protocol(_)
                | ClientError::Timeout
                | ClientError::Disconnected
                | ClientError::MsgIdMismatch { .. }
                | ClientError::MsgTypeMismatch { .. }
        )
    }
}

/// 由会话统一分配，构造请求时的占位
const PLACEHOLDER_MSG_ID: u32 = 0;

/// TDX 客户端（异步）
pub struct Client {
    pool: Pool,
}

impl Client {
    /// 使用默认配置连接到指定地址
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        Self::with_config(&ClientConfig::default().with_hosts([addr])).await
    }

    /// 按配置建立连接池
    pub async fn with_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            pool: Pool::connect(config).await?,
        })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// 发送帧并等待响应
    pub async fn send_frame(&self, frame: RequestFrame) -> Result<ResponseFrame, ClientError> {
        self.pool.send_frame(frame).await
    }

    /// 关闭所有连接
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// 发送心跳
    pub async fn send_heartbeat(&self) -> Result<(), ClientError> {
        let frame = Heartbeat::request(PLACEHOLDER_MSG_ID);
        self.send_frame(frame).await?;
        Ok(())
    }

    // ==================== 代码列表 ====================

    /// 获取股票数量
    pub async fn get_count(&self, exchange: Exchange) -> Result<u16, ClientError> {
        let frame = Count::request(PLACEHOLDER_MSG_ID, exchange);
        let response = self.send_frame(frame).await?;
        Ok(Count::decode_response(response.data())?)
    }

    /// 获取股票代码列表（单次最多1000条）
    pub async fn get_code(&self, exchange: Exchange, start: u16) -> Result<CodeResponse, ClientError> {
        let frame = Code::request(PLACEHOLDER_MSG_ID, exchange, start);
        let response = self
            .send_frame(frame)
            .await
            .map_err(|e| unsupported_if_bj(exchange, e))?;
        Ok(Code::decode_response(response.data())?)
    }

    /// 获取所有股票代码（从0开始）
    pub async fn get_code_all(&self, exchange: Exchange) -> Result<CodeResponse, ClientError> {
        self.get_code_all_from(exchange, 0).await
    }

    /// 获取所有股票代码（从指定位置开始）
    pub async fn get_code_all_from(
        &self,
        exchange: Exchange,
        from_start: u16,
    ) -> Result<CodeResponse, ClientError> {
        let mut all = CodeResponse {
            count: 0,
            codes: Vec::new(),
        };
        let mut start = from_start;

        loop {
            let resp = self.get_code(exchange, start).await?;
            all.codes.extend(resp.codes);
            all.count = list_count(&all.codes)?;

            if resp.count < MAX_CODE_COUNT {
                break;
            }
            match next_start(start, MAX_CODE_COUNT, all.codes.len()) {
                Some(next) => start = next,
                None => break,
            }
        }

        debug!("{} 代码共 {} 条", exchange, all.count);
        Ok(all)
    }

    async fn filter_market_codes(
        &self,
        exchange: Exchange,
        predicate: fn(&str) -> bool,
    ) -> Result<Vec<StockCode>, ClientError> {
        let resp = self.get_code_all(exchange).await?;
        let prefix = exchange.to_string();
        Ok(resp
            .codes
            .into_iter()
            .filter(|c| predicate(&format!("{}{}", prefix, c.code)))
            .collect())
    }

    /// 获取指定市场的股票代码
    pub async fn get_market_stocks(&self, exchange: Exchange) -> Result<Vec<StockCode>, ClientError> {
        self.filter_market_codes(exchange, is_stock).await
    }

    /// 获取指定市场的ETF代码
    pub async fn get_market_etfs(&self, exchange: Exchange) -> Result<Vec<StockCode>, ClientError> {
        self.filter_market_codes(exchange, is_etf).await
    }

    /// 获取指定市场的指数代码
    pub async fn get_market_indexes(&self, exchange: Exchange) -> Result<Vec<StockCode>, ClientError> {
        self.filter_market_codes(exchange, is_index).await
    }

    /// 获取全部市场股票
    ///
    /// 服务器不支持北交所时跳过
    pub async fn get_all_stocks(&self) -> Result<Vec<StockCode>, ClientError> {
        let mut all = Vec::new();
        for ex in Exchange::ALL {
            match self.get_market_stocks(ex).await {
                Ok(stocks) => all.extend(stocks),
                Err(ClientError::UnsupportedMarket(reason)) => warn!("跳过 {}: {}", ex, reason),
                Err(e) => return Err(e),
            }
        }
        Ok(all)
    }

    // ==================== 行情 ====================

    /// 获取行情信息（五档报价），单次最多80个代码
    pub async fn get_quote<S: AsRef<str>>(&self, codes: &[S]) -> Result<Vec<QuoteInfo>, ClientError> {
        let codes: Vec<String> = codes.iter().map(|c| add_prefix(c.as_ref())).collect();
        let frame = Quote::request(PLACEHOLDER_MSG_ID, &codes[..])?;
        let response = self.send_frame(frame).await?;
        Ok(Quote::decode_response(response.data())?)
    }

    // ==================== K线数据 ====================

    /// 获取K线数据（单次最多800条）
    pub async fn get_kline(
        &self,
        kline_type: KlineType,
        code: &str,
        start: u16,
        count: u16,
    ) -> Result<KlineResponse, ClientError> {
        let code = add_prefix(code);
        let is_index = is_index(&code);
        self.request_kline(kline_type, &code, start, count, is_index).await
    }

    async fn request_kline(
        &self,
        kline_type: KlineType,
        code: &str,
        start: u16,
        count: u16,
        is_index: bool,
    ) -> Result<KlineResponse, ClientError> {
        let frame = KlineMsg::request(PLACEHOLDER_MSG_ID, kline_type, code, start, count)?;
        let response = self.send_frame(frame).await?;
        let cache = KlineCache { kline_type, is_index };
        Ok(KlineMsg::decode_response(response.data(), cache)?)
    }

    /// 获取所有K线数据（从0开始，通过多次请求拼接）
    pub async fn get_kline_all(
        &self,
        kline_type: KlineType,
        code: &str,
    ) -> Result<KlineResponse, ClientError> {
        self.get_kline_all_from(kline_type, code, 0).await
    }

    /// 获取所有K线数据（从指定位置开始）
    pub async fn get_kline_all_from(
        &self,
        kline_type: KlineType,
        code: &str,
        from_start: u16,
    ) -> Result<KlineResponse, ClientError> {
        let code = add_prefix(code);
        let is_index = is_index(&code);
        self.kline_all(kline_type, &code, from_start, is_index, |_| true)
            .await
    }

    /// 获取K线数据，直到 keep 返回 false
    ///
    /// 服务器按从新到旧分批返回，遇到第一条不满足的K线即停止，
    /// 更早的数据不再请求。
    pub async fn get_kline_all_until<F>(
        &self,
        kline_type: KlineType,
        code: &str,
        keep: F,
    ) -> Result<KlineResponse, ClientError>
    where
        F: Fn(&Kline) -> bool,
    {
        let code = add_prefix(code);
        let is_index = is_index(&code);
        self.kline_all(kline_type, &code, 0, is_index, keep).await
    }

    async fn kline_all<F>(
        &self,
        kline_type: KlineType,
        code: &str,
        from_start: u16,
        is_index: bool,
        keep: F,
    ) -> Result<KlineResponse, ClientError>
    where
        F: Fn(&Kline) -> bool,
    {
        let mut all = KlineResponse {
            count: 0,
            list: Vec::new(),
        };
        let mut start = from_start;

        loop {
            let resp = self
                .request_kline(kline_type, code, start, MAX_KLINE_COUNT, is_index)
                .await?;
            let full_batch = resp.count >= MAX_KLINE_COUNT;

            // 批内时间升序，从末尾向前找第一条不满足的
            let cut = resp.list.iter().rposition(|k| !keep(k));
            let mut batch = resp.list;
            if let Some(i) = cut {
                batch = batch.split_off(i + 1);
            }
            batch.append(&mut all.list);
            all.list = batch;
            all.count = list_count(&all.list)?;

            if cut.is_some() || !full_batch {
                break;
            }
            match next_start(start, MAX_KLINE_COUNT, all.list.len()) {
                Some(next) => start = next,
                None => break,
            }
        }

        Ok(all)
    }

    /// 获取1分钟K线数据
    pub async fn get_kline_minute(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Minute, code, start, count).await
    }

    /// 获取5分钟K线数据
    pub async fn get_kline_5minute(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Minute5, code, start, count).await
    }

    /// 获取15分钟K线数据
    pub async fn get_kline_15minute(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Minute15, code, start, count).await
    }

    /// 获取30分钟K线数据
    pub async fn get_kline_30minute(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Minute30, code, start, count).await
    }

    /// 获取60分钟K线数据
    pub async fn get_kline_60minute(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Minute60, code, start, count).await
    }

    /// 获取日K线数据
    pub async fn get_kline_day(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Day, code, start, count).await
    }

    /// 获取所有日K线数据
    pub async fn get_kline_day_all(&self, code: &str) -> Result<KlineResponse, ClientError> {
        self.get_kline_all(KlineType::Day, code).await
    }

    pub async fn get_kline_week(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Week, code, start, count).await
    }

    pub async fn get_kline_month(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Month, code, start, count).await
    }

    pub async fn get_kline_quarter(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Quarter, code, start, count).await
    }

    pub async fn get_kline_year(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_kline(KlineType::Year, code, start, count).await
    }

    // ==================== 指数K线数据 ====================

    /// 获取指数K线数据，按指数格式解码（带涨跌家数）
    pub async fn get_index(
        &self,
        kline_type: KlineType,
        code: &str,
        start: u16,
        count: u16,
    ) -> Result<KlineResponse, ClientError> {
        let code = add_prefix(code);
        self.request_kline(kline_type, &code, start, count, true).await
    }

    /// 获取所有指数K线数据
    pub async fn get_index_all(
        &self,
        kline_type: KlineType,
        code: &str,
    ) -> Result<KlineResponse, ClientError> {
        let code = add_prefix(code);
        self.kline_all(kline_type, &code, 0, true, |_| true).await
    }

    /// 获取指数日K线数据
    pub async fn get_index_day(&self, code: &str, start: u16, count: u16) -> Result<KlineResponse, ClientError> {
        self.get_index(KlineType::Day, code, start, count).await
    }

    // ==================== 分时数据 ====================

    /// 获取当日分时数据
    pub async fn get_minute(&self, code: &str) -> Result<MinuteResponse, ClientError> {
        let code = add_prefix(code);
        let frame = MinuteMsg::request(PLACEHOLDER_MSG_ID, &code)?;
        let response = self.send_frame(frame).await?;
        let cache = TradeCache::new(code, today_str());
        Ok(MinuteMsg::decode_response(response.data(), &cache)?)
    }

    /// 获取历史分时数据
    /// date格式：YYYYMMDD
    pub async fn get_history_minute(&self, date: &str, code: &str) -> Result<MinuteResponse, ClientError> {
        let code = add_prefix(code);
        let frame = HistoryMinuteMsg::request(PLACEHOLDER_MSG_ID, date, &code)?;
        let response = self.send_frame(frame).await?;
        let cache = TradeCache::new(code, date);
        Ok(HistoryMinuteMsg::decode_response(response.data(), &cache)?)
    }

    /// 获取最近一个有数据的交易日分时
    ///
    /// 从今天起向前最多回看 lookback_days 天，跳过周末和无数据的日期。
    pub async fn get_latest_minute(
        &self,
        code: &str,
        lookback_days: u32,
    ) -> Result<(String, MinuteResponse), ClientError> {
        let today = beijing_today();
        for back in 0..=lookback_days {
            let Some(day) = today.checked_sub_signed(ChronoDuration::days(back as i64)) else {
                break;
            };
            if is_weekend(day) {
                continue;
            }
            let date = day.format("%Y%m%d").to_string();
            let resp = self.get_history_minute(&date, code).await?;
            if resp.count > 0 {
                return Ok((date, resp));
            }
            debug!("{} {} 无分时数据，继续向前", code, date);
        }
        Err(ClientError::Other(format!(
            "{} 最近{}天没有分时数据",
            code, lookback_days
        )))
    }

    // ==================== 成交明细 ====================

    /// 获取当日分时成交（单次最多1800条）
    pub async fn get_minute_trade(&self, code: &str, start: u16, count: u16) -> Result<TradeResponse, ClientError> {
        let code = add_prefix(code);
        let frame = TradeMsg::request(PLACEHOLDER_MSG_ID, &code, start, count)?;
        let response = self.send_frame(frame).await?;
        let cache = TradeCache::new(code, today_str());
        Ok(TradeMsg::decode_response(response.data(), &cache)?)
    }

    /// 获取当日全部分时成交（通过多次请求拼接）
    pub async fn get_trade_all(&self, code: &str) -> Result<TradeResponse, ClientError> {
        let mut all = TradeResponse {
            count: 0,
            list: Vec::new(),
        };
        let mut start = 0u16;

        loop {
            let resp = self
                .get_minute_trade(code, start, MAX_MINUTE_TRADE_COUNT)
                .await?;
            prepend_trades(&mut all, resp.list)?;

            if resp.count < MAX_MINUTE_TRADE_COUNT {
                break;
            }
            match next_start(start, MAX_MINUTE_TRADE_COUNT, all.list.len()) {
                Some(next) => start = next,
                None => break,
            }
        }

        Ok(all)
    }

    /// 获取历史分时成交（单次最多2000条）
    /// date格式：YYYYMMDD
    pub async fn get_history_minute_trade(
        &self,
        date: &str,
        code: &str,
        start: u16,
        count: u16,
    ) -> Result<TradeResponse, ClientError> {
        let code = add_prefix(code);
        let frame = HistoryTradeMsg::request(PLACEHOLDER_MSG_ID, date, &code, start, count)?;
        let response = self.send_frame(frame).await?;
        let cache = TradeCache::new(code, date);
        Ok(HistoryTradeMsg::decode_response(response.data(), &cache)?)
    }

    /// 获取历史某天全部分时成交
    pub async fn get_history_minute_trade_day(
        &self,
        date: &str,
        code: &str,
    ) -> Result<TradeResponse, ClientError> {
        let mut all = TradeResponse {
            count: 0,
            list: Vec::new(),
        };
        let mut start = 0u16;

        loop {
            let resp = self
                .get_history_minute_trade(date, code, start, MAX_HISTORY_TRADE_COUNT)
                .await?;
            prepend_trades(&mut all, resp.list)?;

            if resp.count < MAX_HISTORY_TRADE_COUNT {
                break;
            }
            match next_start(start, MAX_HISTORY_TRADE_COUNT, all.list.len()) {
                Some(next) => start = next,
                None => break,
            }
        }

        Ok(all)
    }
}

/// 新批次是更早的数据，放在前面
fn prepend_trades(all: &mut TradeResponse, mut batch: Vec<Trade>) -> Result<(), ClientError> {
    batch.append(&mut all.list);
    all.list = batch;
    all.count = list_count(&all.list)?;
    Ok(())
}

/// 下一批的起始位置；起始位置溢出或累计数量可能超出 u16 时停止翻页
fn next_start(start: u16, batch: u16, collected: usize) -> Option<u16> {
    if collected + batch as usize > u16::MAX as usize {
        warn!("累计 {} 条，已达单次汇总上限，停止翻页", collected);
        return None;
    }
    start.checked_add(batch)
}

fn list_count<T>(list: &[T]) -> Result<u16, ClientError> {
    u16::try_from(list.len())
        .map_err(|_| ClientError::Other(format!("记录数超出上限: {}", list.len())))
}

/// 部分服务器不支持北交所，连接层失败时转换为 `UnsupportedMarket`
fn unsupported_if_bj(exchange: Exchange, e: ClientError) -> ClientError {
    if exchange == Exchange::BJ && matches!(e, ClientError::Io(_) | ClientError::Transport { .. }) {
        return ClientError::UnsupportedMarket(format!("当前服务器可能不支持北京交易所: {}", e));
    }
    e
}

fn beijing_today() -> NaiveDate {
    (Utc::now() + ChronoDuration::hours(8)).date_naive()
}

/// 当前日期（YYYYMMDD，北京时间）
fn today_str() -> String {
    beijing_today().format("%Y%m%d").to_string()
}

fn is_weekend(day: NaiveDate) -> bool {
    use chrono::{Datelike, Weekday};
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(ClientError::Timeout.is_transport());
        assert!(ClientError::Disconnected.is_transport());
        assert!(ClientError::MsgIdMismatch { expected: 1, actual: 2 }.is_transport());
        assert!(ClientError::MsgTypeMismatch {
            expected: MessageType::Count,
            actual: MessageType::Heart,
        }
        .is_transport());
        assert!(ClientError::Protocol(FrameError::InvalidPrefix).is_transport());
        assert!(!ClientError::Message(MessageError::InsufficientData).is_transport());
        assert!(!ClientError::Transport { attempts: 3, reason: "x".into() }.is_transport());
    }

    #[test]
    fn bj_failures_become_unsupported() {
        let e = unsupported_if_bj(Exchange::BJ, ClientError::Transport { attempts: 1, reason: "eof".into() });
        assert!(matches!(e, ClientError::UnsupportedMarket(_)));
        let e = unsupported_if_bj(Exchange::SH, ClientError::Timeout);
        assert!(matches!(e, ClientError::Timeout));
    }

    #[test]
    fn prepend_keeps_order() {
        let t = |m: u32| Trade {
            time: NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(9, m, 0)
                .unwrap(),
            price: Price(10_000),
            volume: 1,
            number: 1,
            status: TradeStatus::Buy,
        };
        let mut all = TradeResponse { count: 0, list: Vec::new() };
        prepend_trades(&mut all, vec![t(30), t(31)]).unwrap();
        prepend_trades(&mut all, vec![t(25), t(26)]).unwrap();
        assert_eq!(all.count, 4);
        let minutes: Vec<_> = all.list.iter().map(|x| x.time.format("%M").to_string()).collect();
        assert_eq!(minutes, vec!["25", "26", "30", "31"]);
    }

    #[test]
    fn paging_stops_before_count_overflows() {
        assert_eq!(next_start(0, MAX_KLINE_COUNT, 0), Some(800));
        // 再取一批会超过 u16 上限
        assert_eq!(next_start(64_800, MAX_KLINE_COUNT, 64_800), None);
        assert_eq!(next_start(64_000, MAX_KLINE_COUNT, 64_735), Some(64_800));
        assert_eq!(next_start(u16::MAX - 10, MAX_KLINE_COUNT, 0), None);

        assert_eq!(list_count(&vec![0u8; 65_535]).unwrap(), u16::MAX);
        assert!(matches!(list_count(&vec![0u8; 65_536]), Err(ClientError::Other(_))));
    }

    #[test]
    fn weekend_detection() {
        assert!(is_weekend(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()));
        assert!(!is_weekend(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
    }
}
