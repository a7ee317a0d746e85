//! 打印各市场、各类型的代码数量示例（异步）

use tdx_market::*;

#[derive(Default)]
struct CountSummary {
    stocks: usize,
    etfs: usize,
    indexes: usize,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), ClientError> {
    env_logger::init();
    let client = dial_default().await?;

    let directory = Directory::new();
    directory.refresh(&client).await?;
    println!("目录共 {} 条\n", directory.len());

    let mut totals = CountSummary::default();
    for exchange in Exchange::ALL {
        let mut summary = CountSummary::default();
        for model in directory.snapshot().iter().filter(|m| m.exchange == exchange) {
            let full = model.full_code();
            if is_stock(&full) {
                summary.stocks += 1;
            } else if is_etf(&full) {
                summary.etfs += 1;
            } else if is_index(&full) {
                summary.indexes += 1;
            }
        }

        println!("=== {} ({}) ===", exchange.name(), exchange);
        println!("股票: {}", summary.stocks);
        println!("ETF : {}", summary.etfs);
        println!("指数: {}", summary.indexes);
        println!();

        totals.stocks += summary.stocks;
        totals.etfs += summary.etfs;
        totals.indexes += summary.indexes;
    }

    println!("=== 汇总 ===");
    println!("股票: {}", totals.stocks);
    println!("ETF : {}", totals.etfs);
    println!("指数: {}", totals.indexes);

    client.close().await;
    Ok(())
}
