//! 进程级累计统计
//! 只增不减，没有重置接口；所有计数器均为原子操作，并发净化不会丢失更新

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub url_count: u64,
    pub char_removed: u64,
    pub params_removed: u64,
    pub decoded: u64,
    pub redirected: u64,
}

/// 单次净化的附加计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurificationTally {
    pub params_removed: u64,
    pub decoded: u64,
    pub redirected: u64,
}

/// 统计计数器
#[derive(Debug, Default)]
pub struct StatisticsCounter {
    url_count: AtomicU64,
    char_removed: AtomicU64,
    params_removed: AtomicU64,
    decoded: AtomicU64,
    redirected: AtomicU64,
}

impl StatisticsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次净化：url 计数 +1，字符差值为负时按 0 计
    pub fn record(&self, delta_chars: i64) {
        self.url_count.fetch_add(1, Ordering::Relaxed);
        if delta_chars > 0 {
            self.char_removed.fetch_add(delta_chars as u64, Ordering::Relaxed);
        }
    }

    /// 记录附加计数
    pub fn record_tally(&self, tally: PurificationTally) {
        self.params_removed.fetch_add(tally.params_removed, Ordering::Relaxed);
        self.decoded.fetch_add(tally.decoded, Ordering::Relaxed);
        self.redirected.fetch_add(tally.redirected, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            url_count: self.url_count.load(Ordering::Relaxed),
            char_removed: self.char_removed.load(Ordering::Relaxed),
            params_removed: self.params_removed.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            redirected: self.redirected.load(Ordering::Relaxed),
        }
    }
}

/// 原始 URL 与净化结果的字符数差值
pub fn char_delta(original: &str, purified: &str) -> i64 {
    original.chars().count() as i64 - purified.chars().count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_and_clamp() {
        let counter = StatisticsCounter::new();
        counter.record(13);
        counter.record(0);
        counter.record(-7);
        let snapshot = counter.snapshot();
        assert_eq!(snapshot.url_count, 3);
        assert_eq!(snapshot.char_removed, 13);
    }

    #[test]
    fn test_char_delta_counts_characters() {
        assert_eq!(
            char_delta("https://example.com/a?utm_source=x&id=1", "https://example.com/a?id=1"),
            13
        );
        assert_eq!(char_delta("https://a.com/", "https://a.com/longer"), -6);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let counter = Arc::new(StatisticsCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.record(2);
                        counter.record_tally(PurificationTally {
                            params_removed: 1,
                            ..Default::default()
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = counter.snapshot();
        assert_eq!(snapshot.url_count, 8000);
        assert_eq!(snapshot.char_removed, 16000);
        assert_eq!(snapshot.params_removed, 8000);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(StatisticsSnapshot {
            url_count: 2,
            char_removed: 13,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["urlCount"], 2);
        assert_eq!(json["charRemoved"], 13);
        assert_eq!(json["paramsRemoved"], 0);
    }
}
