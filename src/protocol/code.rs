//! 证券代码解析与分类

use crate::protocol::constants::Exchange;
use crate::protocol::error::MessageError;

/// 补全交易所前缀
///
/// 支持 `sh600000`、`600000.SH` 和纯数字 `600000` 三种写法，统一为小写前缀形式。
pub fn add_prefix(code: &str) -> String {
    let code = code.trim().to_lowercase();
    if code.starts_with("sh") || code.starts_with("sz") || code.starts_with("bj") {
        return code;
    }
    if let Some((number, ex)) = code.split_once('.') {
        if matches!(ex, "sh" | "sz" | "bj") {
            return format!("{}{}", ex, number);
        }
    }
    if code.starts_with('6') || code.starts_with('9') {
        format!("sh{}", code)
    } else if code.starts_with('0') || code.starts_with('3') || code.starts_with('2') {
        format!("sz{}", code)
    } else if code.starts_with('4') || code.starts_with('8') {
        format!("bj{}", code)
    } else {
        format!("sz{}", code)
    }
}

/// 解析股票代码为 (交易所, 6位代码)
pub fn decode_code(code: &str) -> Result<(Exchange, String), MessageError> {
    let full = add_prefix(code);
    if full.len() != 8 || !full.is_char_boundary(2) {
        return Err(MessageError::InvalidCode(code.to_string()));
    }
    let (prefix, number) = full.split_at(2);
    let exchange = prefix
        .parse::<Exchange>()
        .map_err(|_| MessageError::InvalidCode(code.to_string()))?;
    if !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MessageError::InvalidCode(code.to_string()));
    }
    Ok((exchange, number.to_string()))
}

/// 价格分母
///
/// 沪深A股的成交价精确到分，其余品种（基金、指数等）多一位小数，需额外除以10。
pub fn price_denominator(number: &str) -> i64 {
    if is_stock_number(number) {
        1
    } else {
        10
    }
}

/// 是否为沪深A股代码段（60/68/00/30）
pub fn is_stock_number(number: &str) -> bool {
    matches!(number.get(..2), Some("60" | "68" | "00" | "30"))
}

fn split_full(code: &str) -> Option<(String, String)> {
    let code = add_prefix(code);
    if code.len() != 8 || !code.is_char_boundary(2) {
        return None;
    }
    let (ex, num) = code.split_at(2);
    Some((ex.to_string(), num.to_string()))
}

/// 判断是否为股票代码
pub fn is_stock(code: &str) -> bool {
    let Some((ex, num)) = split_full(code) else {
        return false;
    };
    match ex.as_str() {
        "sh" => num.starts_with('6'),
        "sz" => num.starts_with('0') || num.starts_with('3'),
        "bj" => num.starts_with('4') || num.starts_with('8') || num.starts_with("92"),
        _ => false,
    }
}

/// 判断是否为ETF
pub fn is_etf(code: &str) -> bool {
    let Some((ex, num)) = split_full(code) else {
        return false;
    };
    match ex.as_str() {
        "sh" => num.starts_with("51") || num.starts_with("56") || num.starts_with("58"),
        "sz" => num.starts_with("15") || num.starts_with("16"),
        _ => false,
    }
}

/// 判断是否为指数
pub fn is_index(code: &str) -> bool {
    let Some((ex, num)) = split_full(code) else {
        return false;
    };
    match ex.as_str() {
        "sh" => num.starts_with("000") || num.starts_with("880"),
        "sz" => num.starts_with("399"),
        "bj" => num.starts_with("899"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_forms() {
        assert_eq!(add_prefix("600000"), "sh600000");
        assert_eq!(add_prefix("000001"), "sz000001");
        assert_eq!(add_prefix("830799"), "bj830799");
        assert_eq!(add_prefix("SH000001"), "sh000001");
        assert_eq!(add_prefix("600000.SH"), "sh600000");
        assert_eq!(add_prefix(" 399001.sz "), "sz399001");
    }

    #[test]
    fn decode() {
        assert_eq!(
            decode_code("sh600000").unwrap(),
            (Exchange::SH, "600000".to_string())
        );
        assert_eq!(
            decode_code("000001.SZ").unwrap(),
            (Exchange::SZ, "000001".to_string())
        );
        assert_eq!(decode_code("600000").unwrap().0, Exchange::SH);
    }

    #[test]
    fn decode_invalid() {
        for bad in ["", "sh", "sh6000", "sh60000a", "hk00700", "平安银行", "sh6000001"] {
            assert!(
                matches!(decode_code(bad), Err(MessageError::InvalidCode(_))),
                "{} should be invalid",
                bad
            );
        }
    }

    #[test]
    fn denominators() {
        assert_eq!(price_denominator("600000"), 1);
        assert_eq!(price_denominator("688981"), 1);
        assert_eq!(price_denominator("000001"), 1);
        assert_eq!(price_denominator("300750"), 1);
        assert_eq!(price_denominator("510300"), 10);
        assert_eq!(price_denominator("159915"), 10);
        assert_eq!(price_denominator("399001"), 10);
        assert_eq!(price_denominator(""), 10);
    }

    #[test]
    fn classify() {
        assert!(is_stock("sh600000"));
        assert!(is_stock("000001"));
        assert!(!is_stock("sh000001"));
        assert!(!is_stock("sh510300"));
        assert!(is_etf("sh510300"));
        assert!(is_etf("159915"));
        assert!(is_index("sh000001"));
        assert!(is_index("sz399001"));
        assert!(!is_index("sz000001"));
        assert!(!is_stock("bad"));
    }
}
