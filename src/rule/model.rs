//! 规则数据模型定义
//! 仅存储规则数据，无任何业务逻辑，支持序列化/反序列化

use std::fmt;

use serde::{Deserialize, Serialize};

/// 单条规则（从规则导入文档解析）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEntry {
    /// 目录内唯一标识，缺省时使用 provider_name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub provider_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    pub match_patterns: Vec<MatchPatternSpec>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

impl RuleEntry {
    /// 规则的有效 ID
    pub fn rule_id(&self) -> &str {
        self.id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(&self.provider_name)
    }
}

/// 匹配模式：字符串简写或结构化写法
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MatchPatternSpec {
    /// `example.com` 精确主机；`*.example.com` / `.example.com` 主机后缀；`/path` 路径前缀
    Shorthand(String),
    Detailed(PatternFields),
}

/// 结构化匹配模式：至多一种主机条件 + 至多一种路径条件
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatternFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_regex: Option<String>,
}

impl MatchPatternSpec {
    /// 展开简写形式
    pub fn to_fields(&self) -> PatternFields {
        match self {
            MatchPatternSpec::Detailed(fields) => fields.clone(),
            MatchPatternSpec::Shorthand(raw) => {
                let raw = raw.trim();
                if raw.starts_with('/') {
                    PatternFields {
                        path_prefix: Some(raw.to_string()),
                        ..Default::default()
                    }
                } else if let Some(suffix) = raw.strip_prefix("*.").or_else(|| raw.strip_prefix('.')) {
                    PatternFields {
                        host_suffix: Some(suffix.to_string()),
                        ..Default::default()
                    }
                } else {
                    PatternFields {
                        host: Some(raw.to_string()),
                        ..Default::default()
                    }
                }
            }
        }
    }
}

/// 动作定义（按 `type` 字段区分）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionSpec {
    /// 删除指定名称的查询参数
    RemoveParams { names: Vec<String> },
    /// 删除名称匹配正则的查询参数
    RemoveParamsByRegex { pattern: String },
    /// 白名单：仅保留指定名称的查询参数
    KeepParams { names: Vec<String> },
    /// 对路径做正则替换
    RewritePath { pattern: String, replacement: String },
    /// 取出某个参数中嵌套的目标 URL，解码后重新进入匹配
    ExtractParam {
        name: String,
        #[serde(default)]
        decode: Vec<String>,
    },
    /// 解析重定向链，随后在最终地址上重新匹配
    FollowRedirect,
    /// 受限自定义逻辑
    Lambda { body: String },
}

impl ActionSpec {
    /// 动作类型名（日志/统计用）
    pub fn kind(&self) -> &'static str {
        match self {
            ActionSpec::RemoveParams { .. } => "removeParams",
            ActionSpec::RemoveParamsByRegex { .. } => "removeParamsByRegex",
            ActionSpec::KeepParams { .. } => "keepParams",
            ActionSpec::RewritePath { .. } => "rewritePath",
            ActionSpec::ExtractParam { .. } => "extractParam",
            ActionSpec::FollowRedirect => "followRedirect",
            ActionSpec::Lambda { .. } => "lambda",
        }
    }
}

/// 规则导入报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "imported {}, skipped {}", self.imported, self.skipped)
    }
}
