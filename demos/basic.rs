//! 基本使用示例

use tdx_market::*;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), ClientError> {
    env_logger::init();
    println!("=== TDX 行情客户端示例 ===\n");

    println!("1. 连接服务器...");
    let client = dial_default().await?;
    println!("   连接成功！\n");

    println!("2. 获取股票数量...");
    let count_sh = client.get_count(Exchange::SH).await?;
    let count_sz = client.get_count(Exchange::SZ).await?;
    println!("   上海: {} 只, 深圳: {} 只\n", count_sh, count_sz);

    println!("3. 获取代码列表...");
    let codes = client.get_code(Exchange::SH, 0).await?;
    for (i, code) in codes.codes.iter().take(10).enumerate() {
        println!("     {}. {:?}", i + 1, code);
    }
    println!();

    println!("4. 获取五档行情...");
    for quote in client.get_quote(&["sz000001", "600000.SH"]).await? {
        println!("   {:?}", quote);
    }
    println!();

    println!("5. 获取日K线...");
    let klines = client.get_kline_day("sz000001", 0, 5).await?;
    println!("{:?}", klines);

    println!("6. 获取指数日K线...");
    let index = client.get_index_day("sh000001", 0, 5).await?;
    println!("{:?}", index);

    println!("7. 获取当日分时...");
    let minute = client.get_minute("sz000001").await?;
    println!("{:?}", minute);

    println!("8. 获取当日成交明细...");
    let trades = client.get_minute_trade("sz000001", 0, 20).await?;
    println!("{:?}", trades);

    println!("9. 发送心跳包...");
    client.send_heartbeat().await?;
    println!("   心跳包发送成功！\n");

    client.close().await;
    println!("=== 示例完成！===");
    Ok(())
}
