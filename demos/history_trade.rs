//! 历史成交明细示例：拉取某日全部成交并按分钟汇总

use std::collections::BTreeMap;
use tdx_market::*;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), ClientError> {
    env_logger::init();
    let code = std::env::args().nth(1).unwrap_or_else(|| "sh600000".to_string());
    let date = std::env::args().nth(2).unwrap_or_else(|| "20240105".to_string());

    let client = dial_default().await?;
    let trades = client.get_history_minute_trade_day(&date, &code).await?;
    println!("{} {} 共 {} 笔成交", code, date, trades.count);

    let mut per_minute: BTreeMap<String, (i64, usize)> = BTreeMap::new();
    for t in &trades.list {
        let entry = per_minute
            .entry(t.time.format("%H:%M").to_string())
            .or_default();
        entry.0 += t.volume as i64;
        entry.1 += 1;
    }
    for (minute, (volume, n)) in per_minute.iter().take(20) {
        println!("{} {:>8}手 {:>4}笔", minute, volume, n);
    }

    if let (Some(first), Some(last)) = (trades.list.first(), trades.list.last()) {
        println!("开: {:.2} 收: {:.2}", first.price.to_yuan(), last.price.to_yuan());
    }

    client.close().await;
    Ok(())
}
