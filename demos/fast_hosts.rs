//! 测试服务器连接速度示例

use std::time::Duration;
use tdx_market::*;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    println!("=== 测试服务器连接速度 ===\n");
    println!("正在测试 {} 个服务器地址...\n", dial::DEFAULT_HOSTS.len());

    let results = fast_hosts(&[], Duration::from_secs(3)).await;
    if results.is_empty() {
        println!("没有可用的服务器地址");
        return;
    }

    println!("连接速度排序（从快到慢）:");
    println!("{:-<60}", "");
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} - {:.2}ms",
            i + 1,
            result.host,
            result.duration.as_secs_f64() * 1000.0
        );
    }
    println!("{:-<60}", "");

    // 用最快的三个地址建立两个会话的连接池
    let hosts: Vec<String> = results.iter().take(3).map(|r| r.host.clone()).collect();
    let config = ClientConfig::default().with_hosts(hosts).with_pool_size(2);
    match Client::with_config(&config).await {
        Ok(client) => {
            println!("\n连接池状态: {:?}", client.pool().states());
            match client.get_count(Exchange::SH).await {
                Ok(count) => println!("上海交易所代码数量: {}", count),
                Err(e) => println!("获取数量失败: {}", e),
            }
            client.close().await;
        }
        Err(e) => println!("连接失败: {}", e),
    }
}
