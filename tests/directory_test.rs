//! 目录测试 - 整体替换期间并发读取

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tdx_market::{CodeModel, Directory, Exchange};

fn generation(g: u32) -> Vec<CodeModel> {
    let mut models = Vec::new();
    for (exchange, base) in [(Exchange::SH, 600000u32), (Exchange::SZ, 1u32)] {
        for i in 0..50 {
            models.push(CodeModel {
                exchange,
                code: format!("{:06}", base + i),
                name: format!("G{}-{}", g, i),
                multiple: 100,
                decimal: 2,
                last_price: g as f64,
            });
        }
    }
    models
}

#[test]
fn readers_see_whole_snapshots() {
    let directory = Arc::new(Directory::new());
    directory.replace(generation(0));
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let directory = directory.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut seen = 0u64;
                loop {
                    let snapshot = directory.snapshot();
                    assert_eq!(snapshot.len(), 100);
                    let g = snapshot
                        .get(Exchange::SH, "600000")
                        .map(|m| m.last_price)
                        .unwrap();
                    for model in snapshot.iter() {
                        assert_eq!(model.last_price, g);
                        assert!(model.name.starts_with(&format!("G{}-", g as u32)));
                    }

                    // 单条查询的字段来自同一代
                    let model = directory.get("sz000001").unwrap();
                    assert_eq!(model.name, format!("G{}-0", model.last_price as u32));
                    seen += 1;
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                }
                seen
            })
        })
        .collect();

    for g in 1..=300 {
        assert_eq!(directory.replace(generation(g)), 100);
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(directory.get("sh600049").unwrap().last_price, 300.0);
}

#[test]
fn old_snapshot_stays_valid_after_replace() {
    let directory = Directory::new();
    directory.replace(generation(1));
    let old = directory.snapshot();

    directory.replace(Vec::new());
    assert!(directory.is_empty());
    assert_eq!(old.len(), 100);
    assert_eq!(old.get(Exchange::SZ, "000001").unwrap().name, "G1-0");
}
