pub mod code;
pub mod codec;
pub mod constants;
pub mod error;
pub mod frame;
pub mod messages;
pub mod types;

pub use code::{add_prefix, decode_code, is_etf, is_index, is_stock, price_denominator};
pub use codec::*;
pub use constants::{
    Control, Exchange, KlineType, MessageType, DEFAULT_PORT, MAX_CODE_COUNT,
    MAX_HISTORY_TRADE_COUNT, MAX_KLINE_COUNT, MAX_MINUTE_TRADE_COUNT, MAX_QUOTE_CODES, PREFIX,
    PREFIX_RESP, RESPONSE_HEADER_LEN,
};
pub use error::MessageError;
pub use frame::{FrameError, RequestFrame, ResponseFrame, ResponseHeader};
pub use messages::*;
pub use types::{
    CodeResponse, Kline, KlineCache, KlineResponse, MinuteResponse, Price, PriceLevel,
    PriceLevels, PriceNumber, QuoteInfo, StockCode, Trade, TradeCache, TradeResponse, TradeStatus,
    K,
};
