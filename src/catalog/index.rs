//! 主机索引
//! 精确主机表 + 主机后缀表（按主机的各级后缀逐级查找），仅路径模式的规则落入回退列表线性扫描

use std::collections::HashMap;

use crate::compiler::{CompiledRule, HostMatcher};

/// 主机名的各级后缀，从最具体到最宽泛
/// `a.b.com` → `a.b.com`, `b.com`, `com`
pub fn host_suffixes(host: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(host);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.split_once('.').map(|(_, rest)| rest).filter(|rest| !rest.is_empty());
        Some(current)
    })
}

/// 规则下标索引（下标指向快照内的条目数组）
#[derive(Debug, Clone, Default)]
pub struct HostIndex {
    exact: HashMap<String, Vec<usize>>,
    suffix: HashMap<String, Vec<usize>>,
    fallback: Vec<usize>,
}

impl HostIndex {
    /// 为规则列表构建索引
    pub fn build<'a>(rules: impl IntoIterator<Item = &'a CompiledRule>) -> Self {
        let mut index = Self::default();
        for (position, rule) in rules.into_iter().enumerate() {
            let mut in_fallback = false;
            for matcher in &rule.matchers {
                match &matcher.host {
                    HostMatcher::Exact(host) => push_unique(index.exact.entry(host.clone()).or_default(), position),
                    HostMatcher::Suffix(suffix) => {
                        push_unique(index.suffix.entry(suffix.clone()).or_default(), position)
                    }
                    HostMatcher::Any if !in_fallback => {
                        index.fallback.push(position);
                        in_fallback = true;
                    }
                    HostMatcher::Any => {}
                }
            }
        }
        index
    }

    /// 可能命中该主机的候选规则下标（升序、去重）
    pub fn candidates(&self, host: Option<&str>) -> Vec<usize> {
        let mut out = self.fallback.clone();
        if let Some(host) = host {
            if let Some(hits) = self.exact.get(host) {
                out.extend_from_slice(hits);
            }
            for suffix in host_suffixes(host) {
                if let Some(hits) = self.suffix.get(suffix) {
                    out.extend_from_slice(hits);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }

    pub fn suffix_len(&self) -> usize {
        self.suffix.len()
    }

    pub fn fallback_len(&self) -> usize {
        self.fallback.len()
    }
}

fn push_unique(list: &mut Vec<usize>, position: usize) {
    if list.last() != Some(&position) {
        list.push(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompiledMatcher, PathMatcher};

    fn rule(id: &str, hosts: Vec<HostMatcher>) -> CompiledRule {
        CompiledRule {
            id: id.into(),
            provider_name: id.into(),
            priority: 0,
            matchers: hosts
                .into_iter()
                .map(|host| CompiledMatcher {
                    host,
                    path: PathMatcher::Prefix("/".into()),
                })
                .collect(),
            actions: Vec::new(),
        }
    }

    #[test]
    fn test_host_suffixes() {
        let all: Vec<_> = host_suffixes("a.b.example.com").collect();
        assert_eq!(all, ["a.b.example.com", "b.example.com", "example.com", "com"]);
        assert_eq!(host_suffixes("localhost").collect::<Vec<_>>(), ["localhost"]);
    }

    #[test]
    fn test_candidates_by_host() {
        let rules = vec![
            rule("exact", vec![HostMatcher::Exact("www.example.com".into())]),
            rule("suffix", vec![HostMatcher::Suffix("example.com".into())]),
            rule("path", vec![HostMatcher::Any, HostMatcher::Any]),
            rule("other", vec![HostMatcher::Exact("other.org".into())]),
            rule("both", vec![
                HostMatcher::Exact("www.example.com".into()),
                HostMatcher::Exact("www.example.com".into()),
            ]),
        ];
        let index = HostIndex::build(&rules);
        assert_eq!(index.candidates(Some("www.example.com")), [0, 1, 2, 4]);
        assert_eq!(index.candidates(Some("a.example.com")), [1, 2]);
        assert_eq!(index.candidates(Some("notexample.com")), [2]);
        assert_eq!(index.candidates(None), [2]);
        assert_eq!(index.fallback_len(), 1);
        assert_eq!(index.exact_len(), 2);
        assert_eq!(index.suffix_len(), 1);
    }
}
