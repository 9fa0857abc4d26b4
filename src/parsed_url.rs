//! URL 结构化分解
//! 解析一次、按组件修改、确定性地重新序列化。
//! 查询参数保持原始（已百分号编码）文本，未被动作触碰的参数原样输出。

use std::fmt;

use percent_encoding::percent_decode_str;
use url::{form_urlencoded, Url};

use crate::error::{PurlError, PurlResult};

/// 单个查询参数（原始编码形式）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair {
    pub name: String,
    /// `None` 表示参数没有 `=`（例如 `?flag`）
    pub value: Option<String>,
}

impl QueryPair {
    /// 由已解码的名称/值构建（按 application/x-www-form-urlencoded 编码）
    pub fn encoded(name: &str, value: &str) -> Self {
        Self {
            name: form_urlencoded::byte_serialize(name.as_bytes()).collect(),
            value: Some(form_urlencoded::byte_serialize(value.as_bytes()).collect()),
        }
    }

    /// 解码后的参数名
    pub fn decoded_name(&self) -> String {
        decode_component(&self.name)
    }

    /// 解码后的参数值（无值时为空串）
    pub fn decoded_value(&self) -> String {
        self.value.as_deref().map(decode_component).unwrap_or_default()
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.name);
        if let Some(value) = &self.value {
            out.push('=');
            out.push_str(value);
        }
    }
}

/// 查询串组件解码：`+` 视为空格，非法 UTF-8 有损替换
pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// URL 的结构化表示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: String,
    /// 是否带 `//` authority 段（`mailto:` 之类的 URL 没有）
    pub has_authority: bool,
    pub username: String,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
    pub query: Vec<QueryPair>,
    pub fragment: Option<String>,
}

impl ParsedUrl {
    /// 解析任意绝对 URL
    pub fn parse(input: &str) -> PurlResult<Self> {
        let url = Url::parse(input.trim())?;
        Ok(Self::from_url(&url))
    }

    /// 从 `url::Url` 分解
    pub fn from_url(url: &Url) -> Self {
        let query = url
            .query()
            .map(|raw| {
                raw.split('&')
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| match segment.split_once('=') {
                        Some((name, value)) => QueryPair {
                            name: name.to_string(),
                            value: Some(value.to_string()),
                        },
                        None => QueryPair {
                            name: segment.to_string(),
                            value: None,
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            scheme: url.scheme().to_string(),
            has_authority: url.has_authority(),
            username: url.username().to_string(),
            password: url.password().map(str::to_string),
            host: url.host_str().map(str::to_string),
            port: url.port(),
            path: url.path().to_string(),
            query,
            fragment: url.fragment().map(str::to_string),
        }
    }

    /// 小写主机名（去除末尾的 `.`），用于规则匹配
    pub fn match_host(&self) -> Option<String> {
        self.host
            .as_deref()
            .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
    }

    /// 序列化查询串（不含 `?`）
    pub fn query_string(&self) -> String {
        let mut out = String::new();
        for (index, pair) in self.query.iter().enumerate() {
            if index > 0 {
                out.push('&');
            }
            pair.write_to(&mut out);
        }
        out
    }

    /// 确定性序列化：空查询串和空片段被省略
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.scheme.len() + self.path.len() + 64);
        out.push_str(&self.scheme);
        if self.has_authority {
            out.push_str("://");
            if !self.username.is_empty() || self.password.is_some() {
                out.push_str(&self.username);
                if let Some(password) = &self.password {
                    out.push(':');
                    out.push_str(password);
                }
                out.push('@');
            }
            if let Some(host) = &self.host {
                out.push_str(host);
            }
            if let Some(port) = self.port {
                out.push(':');
                out.push_str(&port.to_string());
            }
        } else {
            out.push(':');
        }
        out.push_str(&self.path);

        let query = self.query_string();
        if !query.is_empty() {
            out.push('?');
            out.push_str(&query);
        }
        if let Some(fragment) = self.fragment.as_deref().filter(|f| !f.is_empty()) {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }

    /// 序列化并经 `url` 重新校验，动作产生的非法结构在这里被拦下
    pub fn to_canonical_string(&self) -> PurlResult<String> {
        let serialized = self.serialize();
        Url::parse(&serialized)
            .map(String::from)
            .map_err(|e| PurlError::Transform(format!("invalid url structure `{}`: {}", serialized, e)))
    }

    /// 第一个同名参数的解码值
    pub fn first_param(&self, name: &str) -> Option<String> {
        self.query
            .iter()
            .find(|pair| pair.decoded_name() == name)
            .map(QueryPair::decoded_value)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.query.iter().any(|pair| pair.decoded_name() == name)
    }

    /// 删除所有满足条件的参数（按解码名判断），返回删除数量
    pub fn remove_params_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let before = self.query.len();
        self.query.retain(|pair| !predicate(&pair.decoded_name()));
        before - self.query.len()
    }

    /// 设置参数：替换第一个同名参数并移除其余重复项，不存在则追加
    pub fn set_param(&mut self, name: &str, value: &str) {
        let replacement = QueryPair::encoded(name, value);
        let mut replaced = false;
        self.query.retain_mut(|pair| {
            if pair.decoded_name() != name {
                return true;
            }
            if replaced {
                return false;
            }
            *pair = replacement.clone();
            replaced = true;
            true
        });
        if !replaced {
            self.query.push(replacement);
        }
    }
}

impl fmt::Display for ParsedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}
