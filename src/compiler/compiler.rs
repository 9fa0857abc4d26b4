//! 规则编译器核心
//! 把导入文档中的条目编译为可执行规则；单条失败只记录，不中断整批

use std::collections::HashSet;
use std::time::Instant;

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::{debug, warn};
use url::Host;

use super::pattern::{CompiledAction, CompiledMatcher, CompiledRule, HostMatcher, PathMatcher};
use crate::error::{PurlError, PurlResult};
use crate::evaluator::LambdaProgram;
use crate::rule::{ActionSpec, ImportReport, PatternFields, RuleEntry, RuleLoader};
use crate::utils::{Decoder, ReplacementTemplate};

/// 单个正则源码的长度上限
pub const MAX_PATTERN_LENGTH: usize = 1024;
/// 编译后正则的体积上限
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// 一批条目的编译结果
#[derive(Debug, Default)]
pub struct CompiledBatch {
    /// 按文档顺序排列的成功规则
    pub rules: Vec<CompiledRule>,
    pub report: ImportReport,
}

/// 规则编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 编译整个导入文档；只有文档结构本身非法时返回 Err
    pub fn compile_document(doc: &Value, lambda_max_depth: usize) -> PurlResult<CompiledBatch> {
        let start = Instant::now();
        let entries = RuleLoader::entries(doc)?;
        let mut batch = CompiledBatch::default();
        let mut stats = CompileStats::default();

        for (index, raw) in entries.iter().enumerate() {
            let compiled = RuleLoader::parse_entry(index, raw).and_then(|entry| {
                Self::compile_entry(&entry, lambda_max_depth, &mut stats).map_err(|e| {
                    PurlError::MalformedRule(format!("{}: {}", RuleLoader::describe(index, raw), reason(&e)))
                })
            });
            match compiled {
                Ok(rule) => batch.rules.push(rule),
                Err(e) => {
                    let message = reason(&e);
                    warn!("Skipping malformed rule: {}", message);
                    batch.report.skipped += 1;
                    batch.report.errors.push(message);
                }
            }
        }
        batch.report.imported = batch.rules.len();

        debug!("Rule compilation finished in {:?}", start.elapsed());
        debug!(
            "Compile stats: {} exact-host, {} host-suffix, {} path-only patterns; {} regexes, {} lambdas",
            stats.exact_count, stats.suffix_count, stats.path_count, stats.regex_count, stats.lambda_count
        );
        Ok(batch)
    }

    fn compile_entry(
        entry: &RuleEntry,
        lambda_max_depth: usize,
        stats: &mut CompileStats,
    ) -> PurlResult<CompiledRule> {
        if entry.provider_name.trim().is_empty() {
            return Err(PurlError::MalformedRule("providerName is empty".to_string()));
        }
        if entry.match_patterns.is_empty() {
            return Err(PurlError::MalformedRule("matchPatterns is empty".to_string()));
        }

        let matchers = entry
            .match_patterns
            .iter()
            .map(|spec| Self::compile_matcher(&spec.to_fields(), stats))
            .collect::<PurlResult<Vec<_>>>()?;
        let actions = entry
            .actions
            .iter()
            .map(|spec| Self::compile_action(spec, lambda_max_depth, stats))
            .collect::<PurlResult<Vec<_>>>()?;

        let mut rule = CompiledRule {
            id: entry.rule_id().to_string(),
            provider_name: entry.provider_name.clone(),
            priority: 0,
            matchers,
            actions,
        };
        rule.priority = entry
            .priority
            .unwrap_or_else(|| rule.max_specificity().default_priority());
        Ok(rule)
    }

    /// 编译单个匹配模式
    fn compile_matcher(fields: &PatternFields, stats: &mut CompileStats) -> PurlResult<CompiledMatcher> {
        let host = match (&fields.host, &fields.host_suffix) {
            (Some(_), Some(_)) => {
                return Err(PurlError::MalformedRule(
                    "pattern has both host and hostSuffix".to_string(),
                ))
            }
            (Some(host), None) => {
                stats.exact_count += 1;
                HostMatcher::Exact(normalize_host(host)?)
            }
            (None, Some(suffix)) => {
                stats.suffix_count += 1;
                let suffix = suffix.trim();
                let suffix = suffix
                    .strip_prefix("*.")
                    .or_else(|| suffix.strip_prefix('.'))
                    .unwrap_or(suffix);
                HostMatcher::Suffix(normalize_host(suffix)?)
            }
            (None, None) => HostMatcher::Any,
        };

        let path = match (&fields.path_prefix, &fields.path_regex) {
            (Some(_), Some(_)) => {
                return Err(PurlError::MalformedRule(
                    "pattern has both pathPrefix and pathRegex".to_string(),
                ))
            }
            (Some(prefix), None) => {
                if !prefix.starts_with('/') {
                    return Err(PurlError::MalformedRule(format!(
                        "path prefix `{}` must start with `/`",
                        prefix
                    )));
                }
                PathMatcher::Prefix(prefix.clone())
            }
            (None, Some(pattern)) => {
                stats.regex_count += 1;
                PathMatcher::Regex(compile_regex(pattern)?)
            }
            (None, None) => PathMatcher::Any,
        };

        if matches!(host, HostMatcher::Any) {
            if matches!(path, PathMatcher::Any) {
                return Err(PurlError::MalformedRule("pattern matches nothing specific".to_string()));
            }
            stats.path_count += 1;
        }
        Ok(CompiledMatcher { host, path })
    }

    /// 编译单个动作
    fn compile_action(
        spec: &ActionSpec,
        lambda_max_depth: usize,
        stats: &mut CompileStats,
    ) -> PurlResult<CompiledAction> {
        let action = match spec {
            ActionSpec::RemoveParams { names } => CompiledAction::RemoveParams(name_set(names)),
            ActionSpec::KeepParams { names } => CompiledAction::KeepParams(name_set(names)),
            ActionSpec::RemoveParamsByRegex { pattern } => {
                stats.regex_count += 1;
                CompiledAction::RemoveParamsByRegex(compile_regex(pattern)?)
            }
            ActionSpec::RewritePath { pattern, replacement } => {
                stats.regex_count += 1;
                CompiledAction::RewritePath {
                    regex: compile_regex(pattern)?,
                    replacement: ReplacementTemplate::normalize(replacement),
                }
            }
            ActionSpec::ExtractParam { name, decode } => {
                if name.is_empty() {
                    return Err(PurlError::MalformedRule("extractParam name is empty".to_string()));
                }
                let decoders = decode
                    .iter()
                    .map(|d| d.parse::<Decoder>())
                    .collect::<PurlResult<Vec<_>>>()?;
                CompiledAction::ExtractParam {
                    name: name.clone(),
                    decoders,
                }
            }
            ActionSpec::FollowRedirect => CompiledAction::FollowRedirect,
            ActionSpec::Lambda { body } => {
                stats.lambda_count += 1;
                CompiledAction::Lambda(LambdaProgram::compile(body, lambda_max_depth)?)
            }
        };
        Ok(action)
    }
}

/// 编译正则（长度与体积均受限）
pub fn compile_regex(pattern: &str) -> PurlResult<Regex> {
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(PurlError::MalformedRule(format!(
            "pattern is {} bytes, limit is {}",
            pattern.len(),
            MAX_PATTERN_LENGTH
        )));
    }
    Ok(RegexBuilder::new(pattern).size_limit(REGEX_SIZE_LIMIT).build()?)
}

// 与 url 解析出的主机同形：小写、IDNA 转 punycode、IPv6 带方括号
fn normalize_host(raw: &str) -> PurlResult<String> {
    let host = raw.trim().trim_end_matches('.');
    if host.is_empty() || host.contains(['/', '?', '#', '*']) || host.contains(char::is_whitespace) {
        return Err(PurlError::MalformedRule(format!("invalid host `{}`", raw)));
    }
    Host::parse(host)
        .map(|parsed| parsed.to_string())
        .map_err(|e| PurlError::MalformedRule(format!("invalid host `{}`: {}", raw, e)))
}

fn name_set(names: &[String]) -> HashSet<String> {
    names.iter().cloned().collect()
}

// 去掉 MalformedRule 的前缀，避免报告里重复出现
fn reason(err: &PurlError) -> String {
    match err {
        PurlError::MalformedRule(message) => message.clone(),
        other => other.to_string(),
    }
}

/// 编译统计信息
#[derive(Debug, Clone, Default)]
struct CompileStats {
    exact_count: usize,
    suffix_count: usize,
    path_count: usize,
    regex_count: usize,
    lambda_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Specificity;
    use serde_json::json;

    #[test]
    fn test_partial_failure_batch() {
        let doc = json!({"rules": [
            {"id": "ok", "providerName": "Ok", "matchPatterns": ["example.com"],
             "actions": [{"type": "removeParams", "names": ["utm_source"]}]},
            {"id": "bad-regex", "providerName": "Bad", "matchPatterns": ["a.com"],
             "actions": [{"type": "removeParamsByRegex", "pattern": "("}]},
            {"id": "bad-action", "providerName": "Bad", "matchPatterns": ["a.com"],
             "actions": [{"type": "explode"}]},
            {"providerName": "NoPatterns", "matchPatterns": []},
            {"id": "bad-lambda", "providerName": "Bad", "matchPatterns": ["a.com"],
             "actions": [{"type": "lambda", "body": "rm -rf /"}]}
        ]});
        let batch = RuleCompiler::compile_document(&doc, 64).unwrap();
        assert_eq!(batch.report.imported, 1);
        assert_eq!(batch.report.skipped, 4);
        assert_eq!(batch.rules[0].id, "ok");
        assert!(batch.report.errors[0].starts_with("bad-regex: "));
        assert!(batch.report.errors[1].starts_with("bad-action: "));
        assert!(batch.report.errors[2].starts_with("NoPatterns: "));
    }

    #[test]
    fn test_document_shape_error() {
        assert!(RuleCompiler::compile_document(&json!("nope"), 64).is_err());
        assert!(RuleCompiler::compile_document(&json!({"rules": 1}), 64).is_err());
        let empty = RuleCompiler::compile_document(&json!([]), 64).unwrap();
        assert_eq!(empty.report, ImportReport::default());
    }

    #[test]
    fn test_default_priority_from_specificity() {
        let doc = json!([
            {"providerName": "Exact", "matchPatterns": ["/x", "Example.COM."]},
            {"providerName": "Suffix", "matchPatterns": ["*.example.com"]},
            {"providerName": "Path", "matchPatterns": [{"pathRegex": "^/r/"}]},
            {"providerName": "Explicit", "priority": -3, "matchPatterns": ["x.com"]}
        ]);
        let batch = RuleCompiler::compile_document(&doc, 64).unwrap();
        let priorities: Vec<_> = batch.rules.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, [30, 20, 10, -3]);
        assert_eq!(batch.rules[0].max_specificity(), Specificity::ExactHost);
        assert!(matches!(&batch.rules[0].matchers[1].host, HostMatcher::Exact(h) if h == "example.com"));
    }

    #[test]
    fn test_hosts_normalized_like_parsed_urls() {
        let doc = json!([
            {"id": "idn", "providerName": "I", "matchPatterns": ["Bücher.DE.", "*.bücher.de"]},
            {"id": "v6", "providerName": "V", "matchPatterns": [{"host": "[::1]"}]}
        ]);
        let batch = RuleCompiler::compile_document(&doc, 64).unwrap();
        assert!(batch.report.errors.is_empty());
        assert!(matches!(&batch.rules[0].matchers[0].host, HostMatcher::Exact(h) if h == "xn--bcher-kva.de"));
        assert!(matches!(&batch.rules[0].matchers[1].host, HostMatcher::Suffix(h) if h == "xn--bcher-kva.de"));
        assert!(matches!(&batch.rules[1].matchers[0].host, HostMatcher::Exact(h) if h == "[::1]"));

        let bad = json!([{"providerName": "B", "matchPatterns": ["a.com:8080"]}]);
        assert_eq!(RuleCompiler::compile_document(&bad, 64).unwrap().report.skipped, 1);
    }

    #[test]
    fn test_pattern_validation() {
        let conflicting = json!([{"providerName": "C",
            "matchPatterns": [{"host": "a.com", "hostSuffix": "a.com"}]}]);
        assert_eq!(RuleCompiler::compile_document(&conflicting, 64).unwrap().report.skipped, 1);
        let relative = json!([{"providerName": "R", "matchPatterns": [{"pathPrefix": "x"}]}]);
        assert_eq!(RuleCompiler::compile_document(&relative, 64).unwrap().report.skipped, 1);
        let empty = json!([{"providerName": "E", "matchPatterns": [{}]}]);
        assert_eq!(RuleCompiler::compile_document(&empty, 64).unwrap().report.skipped, 1);
        let long = json!([{"providerName": "L",
            "matchPatterns": [{"pathRegex": "a".repeat(MAX_PATTERN_LENGTH + 1)}]}]);
        assert_eq!(RuleCompiler::compile_document(&long, 64).unwrap().report.skipped, 1);
    }

    #[test]
    fn test_actions_are_compiled() {
        let doc = json!([{"providerName": "A", "matchPatterns": ["a.com"], "actions": [
            {"type": "rewritePath", "pattern": "^/amp(/.*)$", "replacement": "\\1"},
            {"type": "extractParam", "name": "u", "decode": ["url", "base64"]},
            {"type": "followRedirect"},
            {"type": "lambda", "body": "clear_fragment();"}
        ]}]);
        let batch = RuleCompiler::compile_document(&doc, 64).unwrap();
        let rule = &batch.rules[0];
        let kinds: Vec<_> = rule.actions.iter().map(CompiledAction::kind).collect();
        assert_eq!(kinds, ["rewritePath", "extractParam", "followRedirect", "lambda"]);
        let CompiledAction::RewritePath { replacement, .. } = &rule.actions[0] else {
            panic!("expected rewritePath");
        };
        assert_eq!(replacement, "${1}");

        let bad_decoder = json!([{"providerName": "D", "matchPatterns": ["a.com"],
            "actions": [{"type": "extractParam", "name": "u", "decode": ["rot13"]}]}]);
        assert_eq!(RuleCompiler::compile_document(&bad_decoder, 64).unwrap().report.skipped, 1);
    }
}
