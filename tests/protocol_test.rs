//! 协议测试 - 使用抓包字节与构造数据验证编解码

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use tdx_market::protocol::*;

fn bytes(s: &str) -> Vec<u8> {
    hex::decode(s.replace(' ', "")).unwrap()
}

/// 历史成交记录：时间(2) 价格差值 成交量 状态 未知
fn history_trade_record(minutes: u16, delta: i32, volume: i32, status: i32) -> Vec<u8> {
    let mut bs = minutes.to_le_bytes().to_vec();
    bs.extend(encode_varint(delta));
    bs.extend(encode_varint(volume));
    bs.extend(encode_varint(status));
    bs.extend(encode_varint(0));
    bs
}

fn history_trade_payload(records: &[(u16, i32, i32, i32)]) -> Vec<u8> {
    let mut bs = (records.len() as u16).to_le_bytes().to_vec();
    bs.extend([0u8; 4]);
    for &(m, d, v, s) in records {
        bs.extend(history_trade_record(m, d, v, s));
    }
    bs
}

fn ctx() -> TradeCache {
    TradeCache::new("sh600000", "20240105")
}

#[test]
fn test_connect_request() {
    let expected = bytes("0c 01000000 01 0300 0300 0d00 01");
    assert_eq!(Connect::request(1).encode(), expected);

    let frame = RequestFrame::decode(&expected).unwrap();
    assert_eq!(frame.msg_id, 1);
    assert_eq!(frame.msg_type, MessageType::Connect);
    assert_eq!(frame.data, vec![0x01]);
}

#[test]
fn test_heartbeat_and_count_requests() {
    assert_eq!(
        Heartbeat::request(2).encode(),
        bytes("0c 02000000 01 0200 0200 0400")
    );
    assert_eq!(
        Count::request(3, Exchange::SH).encode(),
        bytes("0c 03000000 01 0800 0800 4e04 0100 75c73301")
    );
    assert_eq!(
        Code::request(4, Exchange::SZ, 100).encode(),
        bytes("0c 04000000 01 0600 0600 5004 0000 6400")
    );
}

#[test]
fn test_history_trade_request() {
    let frame = HistoryTradeMsg::request(5, "20240105", "600000", 0, 10).unwrap();
    assert_eq!(frame.msg_type, MessageType::HistoryMinuteTrade);

    let number = "600000";
    assert_eq!(frame.data.len(), 4 + 1 + 1 + number.len() + 2 + 2);
    let date = u32::from_le_bytes([frame.data[0], frame.data[1], frame.data[2], frame.data[3]]);
    assert_eq!(date, 20240105);
    assert_eq!(frame.data[4], Exchange::SH.as_u8());
    assert_eq!(frame.data[5], 0x00);
    assert_eq!(&frame.data[6..12], number.as_bytes());

    assert_eq!(
        frame.encode(),
        bytes("0c050000000112001200b50fe9d63401010036303030303000000a00")
    );
}

#[test]
fn test_history_trade_end_to_end() {
    let deltas = [1050, 1, -2, 0, 3, -1, 2, 0, -1, 1];
    let records: Vec<_> = deltas
        .iter()
        .enumerate()
        .map(|(i, &d)| (570 + i as u16, d, 100 + i as i32, (i % 3) as i32))
        .collect();
    let payload = history_trade_payload(&records);

    let resp = HistoryTradeMsg::decode_response(&payload, &ctx()).unwrap();
    assert_eq!(resp.count, 10);
    assert_eq!(resp.list.len(), 10);

    let expected = [
        10500, 10510, 10490, 10490, 10520, 10510, 10530, 10530, 10520, 10530,
    ];
    let open = chrono::NaiveDate::from_ymd_opt(2024, 1, 5)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap();
    let close = chrono::NaiveDate::from_ymd_opt(2024, 1, 5)
        .unwrap()
        .and_hms_opt(15, 0, 0)
        .unwrap();
    for (i, trade) in resp.list.iter().enumerate() {
        assert_eq!(trade.price, Price(expected[i]), "第{}条价格", i);
        assert_eq!(trade.volume, 100 + i as i32);
        assert_eq!(trade.status, TradeStatus::from_raw((i % 3) as i32));
        assert!(trade.time >= open && trade.time <= close);
    }
    assert_eq!(resp.list[0].time.to_string(), "2024-01-05 09:30:00");
    assert_eq!(resp.list[9].time.to_string(), "2024-01-05 09:39:00");
}

#[test]
fn test_running_price_sum() {
    let cases: Vec<Vec<i32>> = vec![vec![], vec![1234], vec![900, 5, -3, 17, -40, 2, 0, 8]];
    for deltas in cases {
        let records: Vec<_> = deltas.iter().map(|&d| (600u16, d, 1, 0)).collect();
        let resp = HistoryTradeMsg::decode_response(&history_trade_payload(&records), &ctx()).unwrap();
        assert_eq!(resp.list.len(), deltas.len());

        let sum: i64 = deltas.iter().map(|&d| d as i64).sum();
        let last = resp.list.last().map(|t| t.price.as_i64()).unwrap_or(0);
        // 600000 分母为1，价格为原始累加值乘10
        assert_eq!(last, sum * 10);
    }
}

#[test]
fn test_truncated_last_record() {
    let records = [(570u16, 1000, 5, 0), (571, 2, 6, 1), (572, -1, 7, 0)];
    let full = history_trade_payload(&records);
    let last_len = history_trade_record(572, -1, 7, 0).len();

    // 缺少整条最后记录
    let short = &full[..full.len() - last_len];
    assert_eq!(
        HistoryTradeMsg::decode_response(short, &ctx()).err(),
        Some(MessageError::TruncatedRecord { index: 2, count: 3 })
    );

    // 最后记录只剩一半
    let short = &full[..full.len() - 2];
    assert_eq!(
        HistoryTradeMsg::decode_response(short, &ctx()).err(),
        Some(MessageError::TruncatedRecord { index: 2, count: 3 })
    );
}

#[test]
fn test_zero_count_ignores_trailing_bytes() {
    let trailing = bytes("0000 deadbeef 0102030405");
    let cache = ctx();
    let kline = KlineCache {
        kline_type: KlineType::Day,
        is_index: false,
    };

    assert!(HistoryTradeMsg::decode_response(&trailing, &cache).unwrap().list.is_empty());
    assert!(TradeMsg::decode_response(&trailing, &cache).unwrap().list.is_empty());
    assert!(MinuteMsg::decode_response(&trailing, &cache).unwrap().list.is_empty());
    assert!(HistoryMinuteMsg::decode_response(&trailing, &cache).unwrap().list.is_empty());
    assert!(KlineMsg::decode_response(&trailing, kline).unwrap().list.is_empty());
    assert!(Code::decode_response(&trailing).unwrap().codes.is_empty());
    assert!(Quote::decode_response(&bytes("0000 0000 ffff")).unwrap().is_empty());

    // 数量为0时不要求保留字节存在
    assert_eq!(HistoryTradeMsg::decode_response(&[0, 0], &cache).unwrap().count, 0);
}

#[test]
fn test_short_payload() {
    let cache = ctx();
    let kline = KlineCache {
        kline_type: KlineType::Day,
        is_index: false,
    };
    for data in [&[][..], &[0x01][..]] {
        assert_eq!(
            HistoryTradeMsg::decode_response(data, &cache).err(),
            Some(MessageError::InsufficientData)
        );
        assert_eq!(
            TradeMsg::decode_response(data, &cache).err(),
            Some(MessageError::InsufficientData)
        );
        assert_eq!(
            MinuteMsg::decode_response(data, &cache).err(),
            Some(MessageError::InsufficientData)
        );
        assert_eq!(
            KlineMsg::decode_response(data, kline).err(),
            Some(MessageError::InsufficientData)
        );
        assert_eq!(Code::decode_response(data).err(), Some(MessageError::InsufficientData));
        assert_eq!(Count::decode_response(data).err(), Some(MessageError::InsufficientData));
        assert_eq!(Quote::decode_response(data).err(), Some(MessageError::InsufficientData));
    }
}

#[test]
fn test_decode_is_deterministic() {
    let records = [(570u16, 1000, 5, 0), (571, 2, 6, 1), (575, -7, 8, 2)];
    let payload = history_trade_payload(&records);
    let a = HistoryTradeMsg::decode_response(&payload, &ctx()).unwrap();
    let b = HistoryTradeMsg::decode_response(&payload, &ctx()).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_bad_timestamp_aborts_decode() {
    // 25:00 无法解析
    let payload = history_trade_payload(&[(570, 1000, 5, 0), (1500, 1, 1, 0)]);
    assert!(matches!(
        HistoryTradeMsg::decode_response(&payload, &ctx()),
        Err(MessageError::TimestampParse(_))
    ));
}

#[test]
fn test_compressed_response_frame() {
    let payload = history_trade_payload(&[(570, 1050, 10, 0); 40]);
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&payload).unwrap();
    let zipped = enc.finish().unwrap();
    assert_ne!(zipped.len(), payload.len());

    let header = ResponseHeader {
        control: 0x1C,
        msg_id: 5,
        unknown: 0,
        msg_type: MessageType::HistoryMinuteTrade,
        zip_length: zipped.len() as u16,
        length: payload.len() as u16,
    };
    let mut raw = header.encode().to_vec();
    raw.extend(&zipped);

    let frame = ResponseFrame::decode(&raw).unwrap();
    assert_eq!(frame.msg_id(), 5);
    assert_eq!(frame.msg_type(), MessageType::HistoryMinuteTrade);
    assert_eq!(frame.data(), payload.as_slice());

    let resp = HistoryTradeMsg::decode_response(frame.data(), &ctx()).unwrap();
    assert_eq!(resp.count, 40);
    // 每条差值都是1050，累加
    assert_eq!(resp.list[39].price, Price(1050 * 40 * 10));
}

#[test]
fn test_code_resolution() {
    assert_eq!(decode_code("sh600000").unwrap(), (Exchange::SH, "600000".to_string()));
    assert_eq!(decode_code("000001.SZ").unwrap(), (Exchange::SZ, "000001".to_string()));
    assert!(matches!(decode_code("xx600000"), Err(MessageError::InvalidCode(_))));
    assert!(matches!(
        HistoryTradeMsg::request(1, "20240105", "sh6000", 0, 10),
        Err(MessageError::InvalidCode(_))
    ));
    assert!(matches!(
        HistoryTradeMsg::request(1, "2024-01-05", "sh600000", 0, 10),
        Err(MessageError::InvalidRequest(_))
    ));
}
