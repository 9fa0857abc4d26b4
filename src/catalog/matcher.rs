//! 规则匹配器
//! 候选规则经完整模式校验后按 (priority, 命中模式具体程度, 导入序号) 取唯一最优者

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::trace;

use super::catalog::{CatalogEntry, CatalogSnapshot};
use crate::compiler::{CompiledRule, Specificity};
use crate::parsed_url::ParsedUrl;

/// 一次匹配的结果
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub rule: Arc<CompiledRule>,
    pub specificity: Specificity,
    pub seq: u64,
}

impl RuleMatch {
    /// 全序比较：越“大”越优先
    fn precedence(&self, other: &Self) -> Ordering {
        self.rule
            .priority
            .cmp(&other.rule.priority)
            .then(self.specificity.cmp(&other.specificity))
            .then(other.seq.cmp(&self.seq))
    }
}

/// 规则匹配器（无状态）
pub struct RuleMatcher;

impl RuleMatcher {
    /// 找出最优规则；没有任何模式命中时返回 None
    pub fn find(snapshot: &CatalogSnapshot, url: &ParsedUrl) -> Option<RuleMatch> {
        let host = url.match_host();
        let host = host.as_deref();

        let best = snapshot
            .candidates(host)
            .filter_map(|entry| Self::check(entry, host, &url.path))
            .max_by(RuleMatch::precedence);

        if let Some(found) = &best {
            trace!("Matched rule {} ({:?}) for {}", found.rule.id, found.specificity, url);
        }
        best
    }

    /// 所有命中的规则，按优先顺序排列（CLI `--explain` 使用）
    pub fn find_all(snapshot: &CatalogSnapshot, url: &ParsedUrl) -> Vec<RuleMatch> {
        let host = url.match_host();
        let mut all: Vec<_> = snapshot
            .candidates(host.as_deref())
            .filter_map(|entry| Self::check(entry, host.as_deref(), &url.path))
            .collect();
        all.sort_by(|a, b| b.precedence(a));
        all
    }

    fn check(entry: &CatalogEntry, host: Option<&str>, path: &str) -> Option<RuleMatch> {
        entry.rule.best_match(host, path).map(|specificity| RuleMatch {
            rule: entry.rule.clone(),
            specificity,
            seq: entry.seq,
        })
    }
}
