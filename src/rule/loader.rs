//! 规则文档解析
//! 负责把规则导入文档拆分为逐条条目，单条解析失败不影响其余条目

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use super::model::RuleEntry;
use crate::error::{PurlError, PurlResult};

/// 规则文档解析器
pub struct RuleLoader;

impl RuleLoader {
    /// 解析 JSON 文本
    pub fn parse_str(json: &str) -> PurlResult<Value> {
        Ok(serde_json::from_str(json)?)
    }

    /// 读取本地规则文件（CLI 使用）
    pub async fn load_file(path: impl AsRef<Path>) -> PurlResult<Value> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let doc = serde_json::from_slice(&bytes)?;
        debug!("Loaded rule document {} ({} bytes)", path.display(), bytes.len());
        Ok(doc)
    }

    /// 取出文档中的条目列表：`{"rules": [...]}` 或顶层数组
    pub fn entries(doc: &Value) -> PurlResult<&[Value]> {
        match doc {
            Value::Array(items) => Ok(items.as_slice()),
            Value::Object(map) => match map.get("rules") {
                Some(Value::Array(items)) => Ok(items.as_slice()),
                Some(_) => Err(PurlError::RuleDocumentError(
                    "`rules` must be an array".to_string(),
                )),
                None => Err(PurlError::RuleDocumentError(
                    "document has no `rules` array".to_string(),
                )),
            },
            _ => Err(PurlError::RuleDocumentError(
                "document must be an object or an array".to_string(),
            )),
        }
    }

    /// 解析单条条目；失败时错误信息带上条目标识
    pub fn parse_entry(index: usize, raw: &Value) -> PurlResult<RuleEntry> {
        serde_json::from_value::<RuleEntry>(raw.clone())
            .map_err(|e| PurlError::MalformedRule(format!("{}: {}", Self::describe(index, raw), e)))
    }

    /// 条目的人类可读标识：优先 id，其次 providerName，最后序号
    pub fn describe(index: usize, raw: &Value) -> String {
        let field = |key: &str| raw.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
        field("id")
            .or_else(|| field("providerName"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entries_accepts_wrapped_and_bare_arrays() {
        let wrapped = json!({"rules": [{"providerName": "a"}]});
        assert_eq!(RuleLoader::entries(&wrapped).unwrap().len(), 1);
        let bare = json!([{}, {}]);
        assert_eq!(RuleLoader::entries(&bare).unwrap().len(), 2);
    }

    #[test]
    fn test_entries_rejects_other_shapes() {
        assert!(RuleLoader::entries(&json!("nope")).is_err());
        assert!(RuleLoader::entries(&json!({"rules": 3})).is_err());
        assert!(RuleLoader::entries(&json!({"other": []})).is_err());
    }

    #[test]
    fn test_parse_entry_error_names_rule() {
        let raw = json!({"id": "broken", "providerName": "B", "matchPatterns": ["b.com"],
                         "actions": [{"type": "teleport"}]});
        let err = RuleLoader::parse_entry(0, &raw).unwrap_err();
        assert!(matches!(err, PurlError::MalformedRule(_)));
        assert!(err.to_string().contains("broken"));

        let anonymous = json!({"matchPatterns": []});
        let err = RuleLoader::parse_entry(7, &anonymous).unwrap_err();
        assert!(err.to_string().contains("#7"));
    }

    #[tokio::test]
    async fn test_load_file_reads_json() {
        let path = std::env::temp_dir().join(format!("rspurlfy-loader-{}.json", std::process::id()));
        tokio::fs::write(&path, br#"{"rules": []}"#).await.unwrap();
        let doc = RuleLoader::load_file(&path).await.unwrap();
        assert!(RuleLoader::entries(&doc).unwrap().is_empty());
        let _ = tokio::fs::remove_file(&path).await;
    }
}
