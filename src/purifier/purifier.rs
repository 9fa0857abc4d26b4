//! 净化引擎门面：规则导入、单 URL 净化、累计统计
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::catalog::{RuleCatalog, RuleMatcher};
use crate::compiler::RuleCompiler;
use crate::config::EngineConfig;
use crate::error::PurlResult;
use crate::evaluator::{LambdaEvaluator, SandboxEvaluator};
use crate::parsed_url::ParsedUrl;
use crate::pipeline::{ActionPipeline, Continuation};
use crate::redirect::{HopFetcher, HttpHopFetcher, RedirectResolver};
use crate::rule::{ImportReport, RuleLoader};
use crate::stats::{char_delta, PurificationTally, StatisticsCounter, StatisticsSnapshot};

/// 净化结果；`rule` 为 None 时 `url` 与输入一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurificationResult {
    pub url: String,
    pub rule: Option<String>,
}

impl PurificationResult {
    fn unchanged(url: &str) -> Self {
        Self {
            url: url.to_string(),
            rule: None,
        }
    }
}

/// 净化引擎构建器：可替换 lambda 求值器与单跳请求实现
pub struct PurifierBuilder {
    config: EngineConfig,
    evaluator: Option<Arc<dyn LambdaEvaluator>>,
    fetcher: Option<Arc<dyn HopFetcher>>,
}

impl PurifierBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            evaluator: None,
            fetcher: None,
        }
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn LambdaEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn hop_fetcher(mut self, fetcher: Arc<dyn HopFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn build(self) -> PurlResult<Purifier> {
        let config = self.config;
        let evaluator = self
            .evaluator
            .unwrap_or_else(|| Arc::new(SandboxEvaluator::from_config(&config)));

        // 未开启重定向时不创建 HTTP client
        let resolver = if config.redirect_enabled {
            let fetcher: Arc<dyn HopFetcher> = match self.fetcher {
                Some(fetcher) => fetcher,
                None => Arc::new(HttpHopFetcher::new(&config)?),
            };
            Some(RedirectResolver::new(fetcher, &config))
        } else {
            None
        };

        debug!(
            "Purifier ready (lambda: {}, redirect: {}, max iterations: {})",
            config.lambda_enabled, config.redirect_enabled, config.max_iterations
        );
        Ok(Purifier {
            pipeline: ActionPipeline::new(evaluator, &config),
            resolver,
            catalog: RuleCatalog::new(),
            stats: StatisticsCounter::new(),
            config,
        })
    }
}

/// URL 净化引擎
pub struct Purifier {
    config: EngineConfig,
    catalog: RuleCatalog,
    pipeline: ActionPipeline,
    resolver: Option<RedirectResolver>,
    stats: StatisticsCounter,
}

impl Purifier {
    /// 使用默认求值器与 HTTP 实现创建引擎
    pub fn new(config: EngineConfig) -> PurlResult<Self> {
        PurifierBuilder::new(config).build()
    }

    pub fn builder(config: EngineConfig) -> PurifierBuilder {
        PurifierBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// 导入规则文档；只有文档结构非法时返回 Err，单条规则错误记入报告
    pub fn import_rules(&self, doc: &Value) -> PurlResult<ImportReport> {
        let batch = RuleCompiler::compile_document(doc, self.config.lambda_max_depth)?;
        let report = batch.report.clone();
        self.catalog.merge(batch);
        info!("Rules imported: {}", report);
        Ok(report)
    }

    pub fn import_rules_str(&self, json: &str) -> PurlResult<ImportReport> {
        self.import_rules(&RuleLoader::parse_str(json)?)
    }

    /// 从本地文件导入规则
    pub async fn import_rules_file(&self, path: impl AsRef<Path>) -> PurlResult<ImportReport> {
        let doc = RuleLoader::load_file(path).await?;
        self.import_rules(&doc)
    }

    /// 净化单个 URL，从不失败；内部错误一律退化为“未匹配”
    pub async fn purify(&self, url: &str) -> PurificationResult {
        let (result, tally) = self.run(url).await;
        self.record(url, &result, tally);
        result
    }

    /// 可取消的净化：`shutdown` 先完成时丢弃进行中的工作（含网络请求），
    /// 原样返回输入且不计入统计
    pub async fn purify_until<F>(&self, url: &str, shutdown: F) -> PurificationResult
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = shutdown => {
                debug!("Purification of {} cancelled", url);
                PurificationResult::unchanged(url)
            }
            (result, tally) = self.run(url) => {
                self.record(url, &result, tally);
                result
            }
        }
    }

    /// 并发净化一批 URL，结果顺序与输入一致
    pub async fn purify_all(&self, urls: &[&str]) -> Vec<PurificationResult> {
        futures::future::join_all(urls.iter().map(|url| self.purify(url))).await
    }

    /// 累计统计快照
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    fn record(&self, original: &str, result: &PurificationResult, tally: PurificationTally) {
        self.stats.record(char_delta(original, &result.url));
        self.stats.record_tally(tally);
    }

    /// 匹配 → 执行 → 视情况重新进入；失败时保留失败规则之前的状态
    async fn run(&self, input: &str) -> (PurificationResult, PurificationTally) {
        let mut tally = PurificationTally::default();
        let mut current = match ParsedUrl::parse(input) {
            Ok(url) => url,
            Err(e) => {
                debug!("Not a purifiable url `{}`: {}", input, e);
                return (PurificationResult::unchanged(input), tally);
            }
        };

        // 整个调用期间使用同一份快照
        let snapshot = self.catalog.snapshot();
        let mut result = PurificationResult::unchanged(input);
        let mut seen = HashSet::new();

        for iteration in 0..self.config.max_iterations {
            let Some(found) = RuleMatcher::find(&snapshot, &current) else {
                break;
            };
            let rule = &found.rule;

            let outcome = match self.pipeline.apply(&current, rule) {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!("Rule {} not applied to {}: {}", rule.id, current, e);
                    break;
                }
            };
            let Ok(canonical) = outcome.url.to_canonical_string() else {
                break;
            };

            tally.params_removed += outcome.tally.params_removed;
            tally.decoded += outcome.tally.decoded;
            result = PurificationResult {
                url: canonical,
                rule: Some(rule.id.clone()),
            };
            current = outcome.url;
            debug!(
                "Iteration {}: rule {} ({}) -> {}",
                iteration + 1,
                rule.id,
                rule.provider_name,
                result.url
            );

            match outcome.next {
                Continuation::Done => break,
                Continuation::Reenter => {}
                Continuation::FollowRedirect => {
                    let Some(resolver) = &self.resolver else {
                        break;
                    };
                    let resolution = resolver.resolve(&result.url).await;
                    if resolution.url == result.url {
                        break;
                    }
                    let Ok(resolved) = ParsedUrl::parse(&resolution.url) else {
                        break;
                    };
                    tally.redirected += 1;
                    result.url = resolution.url;
                    current = resolved;
                }
            }

            // 重新进入前检测重复地址，避免规则之间互相跳转
            if !seen.insert(result.url.clone()) {
                break;
            }
        }

        (result, tally)
    }
}
