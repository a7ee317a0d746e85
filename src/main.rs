use clap::{Parser, Subcommand};
use std::time::Duration;
use tdx_market::*;

/// 通达信行情查询
#[derive(Parser, Debug)]
#[command(name = "tdx-market", version, about)]
struct Cli {
    /// 服务器地址，可重复指定，缺省使用内置列表
    #[arg(long = "host", global = true)]
    hosts: Vec<String>,

    /// JSON 配置文件
    #[arg(long, global = true)]
    config: Option<String>,

    /// 读超时（毫秒）
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 五档行情
    Quote {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// K线
    Kline {
        code: String,
        /// minute/5minute/15minute/30minute/60minute/day/week/month/quarter/year
        #[arg(long, default_value = "day")]
        period: String,
        #[arg(long, default_value_t = 0)]
        start: u16,
        #[arg(long, default_value_t = 20)]
        count: u16,
    },
    /// 分时，不指定日期时取当日
    Minute {
        code: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// 分时成交，不指定日期时取当日
    Trade {
        code: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value_t = 0)]
        start: u16,
        #[arg(long, default_value_t = 100)]
        count: u16,
    },
    /// 代码数量与列表
    Codes {
        #[arg(long, default_value = "sh")]
        exchange: Exchange,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// 搜索代码或名称
    Search {
        keyword: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// 测试服务器连接速度
    Hosts,
}

fn parse_period(s: &str) -> Option<KlineType> {
    let t = match s {
        "minute" | "1m" => KlineType::Minute,
        "5minute" | "5m" => KlineType::Minute5,
        "15minute" | "15m" => KlineType::Minute15,
        "30minute" | "30m" => KlineType::Minute30,
        "60minute" | "60m" | "hour" => KlineType::Minute60,
        "day" => KlineType::Day,
        "week" => KlineType::Week,
        "month" => KlineType::Month,
        "quarter" => KlineType::Quarter,
        "year" => KlineType::Year,
        _ => return None,
    };
    Some(t)
}

fn load_config(cli: &Cli) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => ClientConfig::default(),
    };
    if !cli.hosts.is_empty() {
        config = config.with_hosts(cli.hosts.iter().cloned());
    }
    if let Some(ms) = cli.read_timeout {
        config = config.with_read_timeout(Duration::from_millis(ms));
    }
    Ok(config)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Command::Hosts = cli.command {
        let hosts: Vec<&str> = config.hosts.iter().map(String::as_str).collect();
        for (i, r) in fast_hosts(&hosts, config.dial_timeout).await.iter().enumerate() {
            println!("{}. {} - {:.2}ms", i + 1, r.host, r.duration.as_secs_f64() * 1000.0);
        }
        return Ok(());
    }

    let client = Client::with_config(&config).await?;

    match cli.command {
        Command::Quote { codes } => {
            for quote in client.get_quote(&codes[..]).await? {
                println!("{:?}", quote);
            }
        }
        Command::Kline {
            code,
            period,
            start,
            count,
        } => {
            let kline_type =
                parse_period(&period).ok_or_else(|| format!("未知的周期: {}", period))?;
            println!("{:?}", client.get_kline(kline_type, &code, start, count).await?);
        }
        Command::Minute { code, date } => {
            let resp = match date {
                Some(date) => client.get_history_minute(&date, &code).await?,
                None => client.get_minute(&code).await?,
            };
            println!("{:?}", resp);
        }
        Command::Trade {
            code,
            date,
            start,
            count,
        } => {
            let resp = match date {
                Some(date) => {
                    client
                        .get_history_minute_trade(&date, &code, start, count)
                        .await?
                }
                None => client.get_minute_trade(&code, start, count).await?,
            };
            println!("{:?}", resp);
        }
        Command::Codes { exchange, limit } => {
            let count = client.get_count(exchange).await?;
            println!("{} 共 {} 条", exchange.name(), count);
            let codes = client.get_code(exchange, 0).await?;
            for code in codes.codes.iter().take(limit) {
                println!("  {:?}", code);
            }
        }
        Command::Search { keyword, limit } => {
            let directory = Directory::new();
            directory.refresh(&client).await?;
            for model in directory.search(&keyword, limit) {
                println!("{} {}", model.full_code(), model.name);
            }
        }
        Command::Hosts => {}
    }

    client.close().await;
    Ok(())
}
