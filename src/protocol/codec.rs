//! 基础读取函数
//!
//! 所有读取函数都接收一段字节窗口，返回 `(剩余字节, 值)`。
//! 数据不足时返回 [`MessageError::InsufficientData`]，不会越界读取。

use crate::protocol::error::MessageError;
use crate::protocol::types::Price;
use chrono::NaiveDateTime;
use encoding_rs::GBK;

/// 变长整数最多占用的字节数（6 + 7 * 4 = 34 位，足以覆盖 i32）
pub const MAX_VARINT_LEN: usize = 5;

/// 读取 n 个字节
pub fn read_bytes(bytes: &[u8], n: usize) -> Result<(&[u8], &[u8]), MessageError> {
    if bytes.len() < n {
        return Err(MessageError::InsufficientData);
    }
    let (head, rest) = bytes.split_at(n);
    Ok((rest, head))
}

/// 读取固定长度数组
pub fn read_array<const N: usize>(bytes: &[u8]) -> Result<(&[u8], [u8; N]), MessageError> {
    let (rest, head) = read_bytes(bytes, N)?;
    let mut arr = [0u8; N];
    arr.copy_from_slice(head);
    Ok((rest, arr))
}

pub fn read_u8(bytes: &[u8]) -> Result<(&[u8], u8), MessageError> {
    let (rest, [b]) = read_array::<1>(bytes)?;
    Ok((rest, b))
}

/// 读取小端序 u16
pub fn read_u16_le(bytes: &[u8]) -> Result<(&[u8], u16), MessageError> {
    let (rest, arr) = read_array::<2>(bytes)?;
    Ok((rest, u16::from_le_bytes(arr)))
}

/// 读取小端序 u32
pub fn read_u32_le(bytes: &[u8]) -> Result<(&[u8], u32), MessageError> {
    let (rest, arr) = read_array::<4>(bytes)?;
    Ok((rest, u32::from_le_bytes(arr)))
}

/// 跳过 n 个字节（保留字段）
pub fn skip(bytes: &[u8], n: usize) -> Result<&[u8], MessageError> {
    read_bytes(bytes, n).map(|(rest, _)| rest)
}

/// 解析变长整数（cut-int）
///
/// 第一字节：
/// - 0x80：是否有后续字节
/// - 0x40：符号位（1=负）
/// - 低6位：数据
///
/// 后续字节：0x80 为后续标志，低7位为数据，依次左移 6、13、20、27 位
pub fn cut_int(bytes: &[u8]) -> Result<(&[u8], i32), MessageError> {
    let first = *bytes.first().ok_or(MessageError::InsufficientData)?;
    let mut data = (first & 0x3F) as i64;
    let mut consumed = 1;
    let mut byte = first;

    while byte & 0x80 != 0 {
        if consumed >= MAX_VARINT_LEN {
            return Err(MessageError::ParseError(format!(
                "变长整数超过{}字节",
                MAX_VARINT_LEN
            )));
        }
        byte = *bytes.get(consumed).ok_or(MessageError::InsufficientData)?;
        data += ((byte & 0x7F) as i64) << (6 + (consumed - 1) * 7);
        consumed += 1;
    }

    if first & 0x40 != 0 {
        data = -data;
    }

    let value = i32::try_from(data)
        .map_err(|_| MessageError::ParseError(format!("变长整数溢出: {}", data)))?;
    Ok((&bytes[consumed..], value))
}

/// 编码变长整数，与 [`cut_int`] 互逆
pub fn encode_varint(value: i32) -> Vec<u8> {
    let mut result = Vec::with_capacity(MAX_VARINT_LEN);
    let mut val = (value as i64).abs();

    let mut first_byte = (val & 0x3F) as u8;
    val >>= 6;
    if value < 0 {
        first_byte |= 0x40;
    }
    if val > 0 {
        first_byte |= 0x80;
    }
    result.push(first_byte);

    while val > 0 {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        result.push(byte);
    }

    result
}

/// 读取价格差值，单位与线路一致（调用方负责换算）
pub fn read_price(bytes: &[u8]) -> Result<(&[u8], Price), MessageError> {
    let (rest, value) = cut_int(bytes)?;
    Ok((rest, Price(value as i64)))
}

/// 读取2字节的分钟偏移，返回 "HH:MM"
pub fn read_hour_minute(bytes: &[u8]) -> Result<(&[u8], String), MessageError> {
    let (rest, n) = read_u16_le(bytes)?;
    Ok((rest, format_hour_minute(n as u32)))
}

pub fn format_hour_minute(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// 日期(YYYYMMDD) + "HH:MM" 组合为时间
pub fn parse_date_minute(date: &str, hour_minute: &str) -> Result<NaiveDateTime, MessageError> {
    let s = format!("{}{}", date, hour_minute);
    NaiveDateTime::parse_from_str(&s, "%Y%m%d%H:%M")
        .map_err(|e| MessageError::TimestampParse(format!("{}: {}", s, e)))
}

/// 读取4字节成交量（通达信浮点编码）
pub fn read_volume(bytes: &[u8]) -> Result<(&[u8], f64), MessageError> {
    let (rest, raw) = read_u32_le(bytes)?;
    Ok((rest, decode_volume(raw)))
}

/// 解析成交量（特殊浮点编码）
pub fn decode_volume(raw: u32) -> f64 {
    let val = raw as i32;
    let logpoint = val >> 24;
    let hleax = (val >> 16) & 0xff;
    let lheax = (val >> 8) & 0xff;
    let lleax = val & 0xff;

    let dw_ecx = logpoint * 2 - 0x7f;
    let dbl_xmm6 = 2_f64.powi(dw_ecx);

    let dbl_xmm4 = if hleax > 0x80 {
        dbl_xmm6 * (64.0 + (hleax & 0x7f) as f64) / 64.0
    } else {
        dbl_xmm6 * hleax as f64 / 128.0
    };

    let scale = if (hleax & 0x80) != 0 { 2.0 } else { 1.0 };

    let dbl_xmm3 = dbl_xmm6 * lheax as f64 / 32768.0 * scale;
    let dbl_xmm1 = dbl_xmm6 * lleax as f64 / 8388608.0 * scale;

    dbl_xmm6 + dbl_xmm4 + dbl_xmm3 + dbl_xmm1
}

/// 将 GBK 编码的字节数组转换为 UTF-8 字符串
pub fn gbk_to_utf8(bytes: &[u8]) -> String {
    let (cow, _, _) = GBK.decode(bytes);
    cow.trim_end_matches('\0').to_string()
}

/// 将 UTF-8 字符串转换为 GBK 编码的字节数组
pub fn utf8_to_gbk(s: &str) -> Vec<u8> {
    let (cow, _, _) = GBK.encode(s);
    cow.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_int_single_byte() {
        assert_eq!(cut_int(&[0x05, 0xAA]).unwrap(), (&[0xAA][..], 5));
        assert_eq!(cut_int(&[0x45]).unwrap(), (&[][..], -5));
        assert_eq!(cut_int(&[0x00]).unwrap().1, 0);
    }

    #[test]
    fn cut_int_multi_byte() {
        // 100 = 0b1_100100 -> 0xA4 0x01
        assert_eq!(cut_int(&[0xA4, 0x01]).unwrap().1, 100);
        assert_eq!(cut_int(&[0xE4, 0x01]).unwrap().1, -100);
        for v in [63, 64, 8191, 8192, -1_000_000, i32::MAX, -i32::MAX] {
            let bs = encode_varint(v);
            assert_eq!(cut_int(&bs).unwrap(), (&[][..], v), "value {}", v);
        }
    }

    #[test]
    fn cut_int_short_input() {
        assert_eq!(cut_int(&[]), Err(MessageError::InsufficientData));
        assert_eq!(cut_int(&[0x80]), Err(MessageError::InsufficientData));
        assert_eq!(cut_int(&[0x80, 0x80]), Err(MessageError::InsufficientData));
    }

    #[test]
    fn cut_int_too_long() {
        let bs = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(matches!(cut_int(&bs), Err(MessageError::ParseError(_))));
    }

    #[test]
    fn fixed_readers() {
        let bs = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFF];
        let (rest, a) = read_u16_le(&bs).unwrap();
        assert_eq!(a, 0x1234);
        let (rest, b) = read_u32_le(rest).unwrap();
        assert_eq!(b, 0x1234_5678);
        assert_eq!(rest, &[0xFF]);
        assert_eq!(read_u16_le(rest), Err(MessageError::InsufficientData));
        assert_eq!(read_u32_le(&bs[..3]), Err(MessageError::InsufficientData));
        assert_eq!(skip(&bs, 8), Err(MessageError::InsufficientData));
    }

    #[test]
    fn hour_minute() {
        let (_, s) = read_hour_minute(&570u16.to_le_bytes()).unwrap();
        assert_eq!(s, "09:30");
        let (_, s) = read_hour_minute(&900u16.to_le_bytes()).unwrap();
        assert_eq!(s, "15:00");
        assert_eq!(read_hour_minute(&[0x01]), Err(MessageError::InsufficientData));
    }

    #[test]
    fn date_minute_parse() {
        let t = parse_date_minute("20240105", "09:31").unwrap();
        assert_eq!(t.to_string(), "2024-01-05 09:31:00");
        assert!(matches!(
            parse_date_minute("20240105", "25:99"),
            Err(MessageError::TimestampParse(_))
        ));
        assert!(matches!(
            parse_date_minute("2024-1-5", "09:31"),
            Err(MessageError::TimestampParse(_))
        ));
    }

    #[test]
    fn gbk_round_trip() {
        let bs = utf8_to_gbk("平安银行");
        assert_eq!(bs.len(), 8);
        let mut padded = bs.clone();
        padded.extend_from_slice(&[0, 0]);
        assert_eq!(gbk_to_utf8(&padded), "平安银行");
    }
}
