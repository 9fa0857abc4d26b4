//! 编译后规则模型
//! 匹配模式与动作在导入期一次编译完成，运行期只读共享

use std::collections::HashSet;
use std::fmt;

use regex::Regex;

use crate::evaluator::LambdaProgram;
use crate::utils::Decoder;

/// 模式具体程度：精确主机 > 主机后缀 > 仅路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Specificity {
    PathOnly = 1,
    HostSuffix = 2,
    ExactHost = 3,
}

impl Specificity {
    /// 未显式给出 priority 时的默认值
    pub fn default_priority(self) -> i32 {
        10 * self as i32
    }
}

/// 主机条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMatcher {
    Exact(String),
    Suffix(String),
    Any,
}

/// 路径条件（针对原始编码的路径）
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Prefix(String),
    Regex(Regex),
    Any,
}

impl PathMatcher {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathMatcher::Regex(regex) => regex.is_match(path),
            PathMatcher::Any => true,
        }
    }
}

/// 单个编译后的匹配模式
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    pub host: HostMatcher,
    pub path: PathMatcher,
}

impl CompiledMatcher {
    pub fn specificity(&self) -> Specificity {
        match self.host {
            HostMatcher::Exact(_) => Specificity::ExactHost,
            HostMatcher::Suffix(_) => Specificity::HostSuffix,
            HostMatcher::Any => Specificity::PathOnly,
        }
    }

    /// `host` 必须已是小写且去掉末尾的 `.`
    pub fn matches(&self, host: Option<&str>, path: &str) -> bool {
        let host_ok = match (&self.host, host) {
            (HostMatcher::Any, _) => true,
            (HostMatcher::Exact(expected), Some(host)) => host == expected,
            (HostMatcher::Suffix(suffix), Some(host)) => {
                host == suffix
                    || (host.len() > suffix.len()
                        && host.ends_with(suffix.as_str())
                        && host.as_bytes()[host.len() - suffix.len() - 1] == b'.')
            }
            (_, None) => false,
        };
        host_ok && self.path.matches(path)
    }
}

/// 编译后的动作
#[derive(Clone)]
pub enum CompiledAction {
    RemoveParams(HashSet<String>),
    RemoveParamsByRegex(Regex),
    KeepParams(HashSet<String>),
    RewritePath { regex: Regex, replacement: String },
    ExtractParam { name: String, decoders: Vec<Decoder> },
    FollowRedirect,
    Lambda(LambdaProgram),
}

impl CompiledAction {
    pub fn kind(&self) -> &'static str {
        match self {
            CompiledAction::RemoveParams(_) => "removeParams",
            CompiledAction::RemoveParamsByRegex(_) => "removeParamsByRegex",
            CompiledAction::KeepParams(_) => "keepParams",
            CompiledAction::RewritePath { .. } => "rewritePath",
            CompiledAction::ExtractParam { .. } => "extractParam",
            CompiledAction::FollowRedirect => "followRedirect",
            CompiledAction::Lambda(_) => "lambda",
        }
    }
}

impl fmt::Debug for CompiledAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledAction::RemoveParams(names) | CompiledAction::KeepParams(names) => {
                let mut sorted: Vec<_> = names.iter().collect();
                sorted.sort();
                write!(f, "{}({:?})", self.kind(), sorted)
            }
            CompiledAction::RemoveParamsByRegex(regex) => write!(f, "{}({})", self.kind(), regex),
            CompiledAction::RewritePath { regex, replacement } => {
                write!(f, "{}({} -> {})", self.kind(), regex, replacement)
            }
            CompiledAction::ExtractParam { name, decoders } => {
                write!(f, "{}({}, {:?})", self.kind(), name, decoders)
            }
            CompiledAction::FollowRedirect => f.write_str(self.kind()),
            CompiledAction::Lambda(program) => write!(f, "{}({:?})", self.kind(), program),
        }
    }
}

/// 编译后的规则（目录内以 Arc 共享）
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub provider_name: String,
    pub priority: i32,
    pub matchers: Vec<CompiledMatcher>,
    pub actions: Vec<CompiledAction>,
}

impl CompiledRule {
    /// 规则中最具体的模式
    pub fn max_specificity(&self) -> Specificity {
        self.matchers
            .iter()
            .map(CompiledMatcher::specificity)
            .max()
            .unwrap_or(Specificity::PathOnly)
    }

    /// 命中 URL 的模式中最具体的一个；未命中返回 None
    pub fn best_match(&self, host: Option<&str>, path: &str) -> Option<Specificity> {
        self.matchers
            .iter()
            .filter(|m| m.matches(host, path))
            .map(CompiledMatcher::specificity)
            .max()
    }
}
