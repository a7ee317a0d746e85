//! 证券代码目录
//!
//! 读多写少。刷新时先完整构建新快照，再整体替换 `Arc`，
//! 读者拿到的快照在其生命周期内保持一致。

use crate::client::{Client, ClientError};
use crate::protocol::{decode_code, is_stock, Exchange, StockCode};
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 目录中的一条证券
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeModel {
    pub exchange: Exchange,
    pub code: String,
    pub name: String,
    pub multiple: u16,
    pub decimal: i8,
    pub last_price: f64,
}

impl CodeModel {
    pub fn from_stock_code(exchange: Exchange, code: StockCode) -> Self {
        Self {
            exchange,
            code: code.code,
            name: code.name,
            multiple: code.multiple,
            decimal: code.decimal,
            last_price: code.last_price,
        }
    }

    /// 带交易所前缀的完整代码，如 sh600000
    pub fn full_code(&self) -> String {
        format!("{}{}", self.exchange, self.code)
    }
}

/// 某一时刻的完整目录
#[derive(Debug, Default)]
pub struct Snapshot {
    by_key: HashMap<(Exchange, String), Arc<CodeModel>>,
    ordered: Vec<Arc<CodeModel>>,
    updated_at: Option<DateTime<Local>>,
}

impl Snapshot {
    fn build(models: Vec<CodeModel>) -> Self {
        let mut by_key = HashMap::with_capacity(models.len());
        let mut ordered: Vec<Arc<CodeModel>> = Vec::with_capacity(models.len());
        for model in models {
            let key = (model.exchange, model.code.clone());
            let model = Arc::new(model);
            // 重复键以后出现的为准
            if let Some(old) = by_key.insert(key, model.clone()) {
                ordered.retain(|m| !Arc::ptr_eq(m, &old));
            }
            ordered.push(model);
        }
        ordered.sort_by(|a, b| (a.exchange, &a.code).cmp(&(b.exchange, &b.code)));
        Self {
            by_key,
            ordered,
            updated_at: Some(Local::now()),
        }
    }

    pub fn get(&self, exchange: Exchange, code: &str) -> Option<&Arc<CodeModel>> {
        self.by_key.get(&(exchange, code.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CodeModel>> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.updated_at
    }
}

#[derive(Debug, Default)]
pub struct Directory {
    current: RwLock<Arc<Snapshot>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// 用新的代码集合整体替换目录，返回条数
    pub fn replace(&self, models: Vec<CodeModel>) -> usize {
        let snapshot = Arc::new(Snapshot::build(models));
        let len = snapshot.len();
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = snapshot;
        len
    }

    /// 从服务器拉取沪深京全部代码并替换目录
    ///
    /// 沪深失败时保留旧目录并返回错误，北交所失败只记录日志。
    pub async fn refresh(&self, client: &Client) -> Result<usize, ClientError> {
        let mut models = Vec::new();
        for exchange in Exchange::ALL {
            match client.get_code_all(exchange).await {
                Ok(resp) => models.extend(
                    resp.codes
                        .into_iter()
                        .map(|c| CodeModel::from_stock_code(exchange, c)),
                ),
                Err(e) if exchange == Exchange::BJ => {
                    warn!("北交所代码获取失败，跳过: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        let len = self.replace(models);
        info!("代码目录已刷新，共 {} 条", len);
        Ok(len)
    }

    /// 按代码查询，支持 sh600000 / 600000.SH / 600000
    pub fn get(&self, code: &str) -> Option<Arc<CodeModel>> {
        let (exchange, number) = decode_code(code).ok()?;
        self.snapshot().get(exchange, &number).cloned()
    }

    /// 全部代码，stock_only 时只保留个股
    pub fn codes(&self, stock_only: bool) -> Vec<Arc<CodeModel>> {
        self.snapshot()
            .iter()
            .filter(|m| !stock_only || is_stock(&m.full_code()))
            .cloned()
            .collect()
    }

    /// 按代码或名称模糊搜索，代码前缀匹配优先
    pub fn search(&self, keyword: &str, limit: usize) -> Vec<Arc<CodeModel>> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() || limit == 0 {
            return Vec::new();
        }

        let snapshot = self.snapshot();
        let mut prefix_hits = Vec::new();
        let mut other_hits = Vec::new();
        for model in snapshot.iter() {
            let full = model.full_code();
            if model.code.starts_with(&keyword) || full.starts_with(&keyword) {
                prefix_hits.push(model.clone());
            } else if model.code.contains(&keyword) || model.name.to_lowercase().contains(&keyword) {
                other_hits.push(model.clone());
            }
            if prefix_hits.len() >= limit {
                break;
            }
        }
        prefix_hits.extend(other_hits);
        prefix_hits.truncate(limit);
        prefix_hits
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(exchange: Exchange, code: &str, name: &str) -> CodeModel {
        CodeModel {
            exchange,
            code: code.to_string(),
            name: name.to_string(),
            multiple: 100,
            decimal: 2,
            last_price: 0.0,
        }
    }

    fn sample() -> Vec<CodeModel> {
        vec![
            model(Exchange::SH, "600000", "浦发银行"),
            model(Exchange::SH, "000001", "上证指数"),
            model(Exchange::SZ, "000001", "平安银行"),
            model(Exchange::SZ, "159915", "创业板ETF"),
        ]
    }

    #[test]
    fn replace_and_get() {
        let dir = Directory::new();
        assert!(dir.is_empty());
        assert!(dir.snapshot().updated_at().is_none());

        assert_eq!(dir.replace(sample()), 4);
        assert_eq!(dir.get("sh600000").unwrap().name, "浦发银行");
        assert_eq!(dir.get("000001.SZ").unwrap().name, "平安银行");
        assert_eq!(dir.get("sh000001").unwrap().name, "上证指数");
        assert!(dir.get("sh601398").is_none());
        assert!(dir.get("bad").is_none());
    }

    #[test]
    fn duplicate_key_keeps_last() {
        let dir = Directory::new();
        let mut models = sample();
        models.push(model(Exchange::SH, "600000", "浦发"));
        assert_eq!(dir.replace(models), 4);
        assert_eq!(dir.get("sh600000").unwrap().name, "浦发");
    }

    #[test]
    fn stock_only_filter() {
        let dir = Directory::new();
        dir.replace(sample());
        let codes: Vec<String> = dir.codes(true).iter().map(|m| m.full_code()).collect();
        assert_eq!(codes, vec!["sz000001".to_string(), "sh600000".to_string()]);
        assert_eq!(dir.codes(false).len(), 4);
    }

    #[test]
    fn search_prefers_code_prefix() {
        let dir = Directory::new();
        dir.replace(sample());

        let hits = dir.search("银行", 10);
        assert_eq!(hits.len(), 2);

        let hits = dir.search("0000", 10);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|m| m.code == "000001"));

        let hits = dir.search("sz", 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].exchange, Exchange::SZ);

        assert!(dir.search("  ", 10).is_empty());
        assert!(dir.search("etf", 10).iter().any(|m| m.code == "159915"));
    }
}
