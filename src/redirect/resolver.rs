//! 重定向解析
//! 逐跳跟随 `Location`，受跳数上限与单跳超时约束；出现环或任何失败时
//! 停在最后一个成功获得的地址上，从不向上层报错

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use url::Url;

use super::fetcher::{Hop, HopFetcher};
use crate::config::EngineConfig;

/// 解析停止的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// 到达非重定向响应
    Final,
    /// 达到跳数上限
    HopLimit,
    /// 下一跳指向链上已访问过的地址
    Cycle,
    /// 超时/网络错误/非法 Location
    Failed(String),
}

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub url: String,
    pub hops: usize,
    pub stop: StopReason,
}

/// 重定向解析器
#[derive(Clone)]
pub struct RedirectResolver {
    fetcher: Arc<dyn HopFetcher>,
    max_hops: usize,
    hop_timeout: Duration,
}

impl RedirectResolver {
    pub fn new(fetcher: Arc<dyn HopFetcher>, config: &EngineConfig) -> Self {
        Self {
            fetcher,
            max_hops: config.max_redirect_hops,
            hop_timeout: config.redirect_timeout,
        }
    }

    /// 解析重定向链，返回最后一个可信的地址
    pub async fn resolve(&self, start: &str) -> Resolution {
        let mut current = match Url::parse(start) {
            Ok(url) => url,
            Err(e) => return Self::stopped(start.to_string(), 0, StopReason::Failed(e.to_string())),
        };
        let mut visited = HashSet::new();
        visited.insert(current.as_str().to_string());

        for hop in 0..self.max_hops {
            let fetched = tokio::time::timeout(self.hop_timeout, self.fetcher.fetch(&current)).await;
            let location = match fetched {
                Err(_) => {
                    let reason = format!("hop {} timed out after {:?}", hop + 1, self.hop_timeout);
                    return Self::stopped(current.into(), hop, StopReason::Failed(reason));
                }
                Ok(Err(e)) => return Self::stopped(current.into(), hop, StopReason::Failed(e.to_string())),
                Ok(Ok(Hop::Final)) => return Self::stopped(current.into(), hop, StopReason::Final),
                Ok(Ok(Hop::Redirect(location))) => location,
            };

            let next = match current.join(&location) {
                Ok(next) if matches!(next.scheme(), "http" | "https") => next,
                Ok(next) => {
                    let reason = format!("refusing to follow {} redirect", next.scheme());
                    return Self::stopped(current.into(), hop, StopReason::Failed(reason));
                }
                Err(e) => {
                    let reason = format!("bad Location `{}`: {}", location, e);
                    return Self::stopped(current.into(), hop, StopReason::Failed(reason));
                }
            };
            if !visited.insert(next.as_str().to_string()) {
                return Self::stopped(current.into(), hop, StopReason::Cycle);
            }
            current = next;
        }

        Self::stopped(current.into(), self.max_hops, StopReason::HopLimit)
    }

    fn stopped(url: String, hops: usize, stop: StopReason) -> Resolution {
        debug!("Redirect resolution stopped at {} after {} hop(s): {:?}", url, hops, stop);
        Resolution { url, hops, stop }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::error::{PurlError, PurlResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 合成跳转表：缺失的地址视为终点
    struct SyntheticFetcher {
        redirects: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl SyntheticFetcher {
        fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                redirects: pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HopFetcher for SyntheticFetcher {
        async fn fetch(&self, url: &Url) -> PurlResult<Hop> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.path() == "/down" {
                return Err(PurlError::RedirectResolution("connection refused".into()));
            }
            Ok(match self.redirects.get(url.as_str()) {
                Some(next) => Hop::Redirect(next.clone()),
                None => Hop::Final,
            })
        }
    }

    struct StallingFetcher;

    #[async_trait]
    impl HopFetcher for StallingFetcher {
        async fn fetch(&self, _url: &Url) -> PurlResult<Hop> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Hop::Final)
        }
    }

    fn resolver(fetcher: Arc<dyn HopFetcher>) -> RedirectResolver {
        RedirectResolver::new(fetcher, &ConfigManager::custom().max_redirect_hops(5).build())
    }

    #[tokio::test]
    async fn test_follows_chain_with_relative_location() {
        let fetcher = SyntheticFetcher::new(&[
            ("https://s.io/a", "https://t.io/b"),
            ("https://t.io/b", "/c?x=1"),
        ]);
        let out = resolver(fetcher).resolve("https://s.io/a").await;
        assert_eq!(out.url, "https://t.io/c?x=1");
        assert_eq!(out.hops, 2);
        assert_eq!(out.stop, StopReason::Final);
    }

    #[tokio::test]
    async fn test_chain_longer_than_cap_stops_at_cap() {
        let pairs: Vec<(String, String)> = (0..10)
            .map(|i| (format!("https://r.io/{}", i), format!("https://r.io/{}", i + 1)))
            .collect();
        let refs: Vec<(&str, &str)> = pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let fetcher = SyntheticFetcher::new(&refs);
        let out = resolver(fetcher.clone()).resolve("https://r.io/0").await;
        assert_eq!(out.url, "https://r.io/5");
        assert_eq!(out.stop, StopReason::HopLimit);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_cycle_returns_pre_cycle_url() {
        let fetcher = SyntheticFetcher::new(&[
            ("https://c.io/1", "https://c.io/2"),
            ("https://c.io/2", "https://c.io/3"),
            ("https://c.io/3", "https://c.io/1"),
        ]);
        let out = resolver(fetcher).resolve("https://c.io/1").await;
        assert_eq!(out.url, "https://c.io/3");
        assert_eq!(out.stop, StopReason::Cycle);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good_url() {
        let fetcher = SyntheticFetcher::new(&[
            ("https://f.io/a", "https://f.io/down"),
            ("https://f.io/b", "ftp://f.io/file"),
        ]);
        let out = resolver(fetcher.clone()).resolve("https://f.io/a").await;
        assert_eq!(out.url, "https://f.io/down");
        assert!(matches!(out.stop, StopReason::Failed(_)));

        let out = resolver(fetcher).resolve("https://f.io/b").await;
        assert_eq!(out.url, "https://f.io/b");
        assert!(matches!(out.stop, StopReason::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hop_timeout() {
        let config = ConfigManager::custom().redirect_timeout(Duration::from_secs(3)).build();
        let resolver = RedirectResolver::new(Arc::new(StallingFetcher), &config);
        let out = resolver.resolve("https://slow.io/").await;
        assert_eq!(out.url, "https://slow.io/");
        assert!(matches!(out.stop, StopReason::Failed(reason) if reason.contains("timed out")));
    }
}
