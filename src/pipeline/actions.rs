//! 纯动作实现：参数删除/保留、路径改写、嵌套 URL 提取
//! 均只修改传入的 ParsedUrl，不做任何 I/O

use std::collections::HashSet;

use regex::Regex;

use crate::error::{PurlError, PurlResult};
use crate::parsed_url::ParsedUrl;
use crate::utils::Decoder;

/// 删除指定名称的参数，返回删除数量
pub fn remove_params(url: &mut ParsedUrl, names: &HashSet<String>) -> usize {
    url.remove_params_where(|name| names.contains(name))
}

/// 删除名称匹配正则的参数
pub fn remove_params_by_regex(url: &mut ParsedUrl, regex: &Regex) -> usize {
    url.remove_params_where(|name| regex.is_match(name))
}

/// 只保留白名单内的参数
pub fn keep_params(url: &mut ParsedUrl, names: &HashSet<String>) -> usize {
    url.remove_params_where(|name| !names.contains(name))
}

/// 对路径做正则替换
pub fn rewrite_path(url: &mut ParsedUrl, regex: &Regex, replacement: &str) -> PurlResult<bool> {
    let rewritten = regex.replace_all(&url.path, replacement);
    if rewritten == url.path {
        return Ok(false);
    }
    if url.has_authority && !rewritten.is_empty() && !rewritten.starts_with('/') {
        return Err(PurlError::Transform(format!(
            "rewritten path `{}` is not absolute",
            rewritten
        )));
    }
    url.path = rewritten.into_owned();
    Ok(true)
}

/// 取出参数值，经解码器链还原为嵌套的目标 URL
pub fn extract_param(url: &ParsedUrl, name: &str, decoders: &[Decoder]) -> PurlResult<ParsedUrl> {
    let raw = url
        .first_param(name)
        .ok_or_else(|| PurlError::Transform(format!("parameter `{}` not present", name)))?;
    let decoded = Decoder::apply_chain(decoders, &raw)?;
    let target = ParsedUrl::parse(&decoded)
        .map_err(|_| PurlError::Transform(format!("parameter `{}` does not hold a url", name)))?;
    if !target.has_authority || target.host.is_none() {
        return Err(PurlError::Transform(format!(
            "parameter `{}` holds `{}`, not a network url",
            name, decoded
        )));
    }
    Ok(target)
}
