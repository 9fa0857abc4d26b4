//! 全局净化引擎单例管理
//! 聊天适配器等进程级调用方只需初始化一次，之后通过三个入口函数使用
use once_cell::sync::OnceCell;
use serde_json::Value;

use super::purifier::{PurificationResult, Purifier};
use crate::config::{ConfigManager, EngineConfig};
use crate::error::{PurlError, PurlResult};
use crate::rule::ImportReport;
use crate::stats::StatisticsSnapshot;

/// 全局引擎实例
static GLOBAL_PURIFIER: OnceCell<Purifier> = OnceCell::new();

/// 初始化全局引擎（默认配置）
pub fn init_purifier() -> PurlResult<&'static Purifier> {
    init_purifier_with_config(ConfigManager::get_default())
}

/// 带自定义配置初始化全局引擎；重复调用返回已有实例，新配置被忽略
pub fn init_purifier_with_config(config: EngineConfig) -> PurlResult<&'static Purifier> {
    GLOBAL_PURIFIER.get_or_try_init(|| Purifier::new(config))
}

/// 获取全局引擎
pub fn global_purifier() -> PurlResult<&'static Purifier> {
    GLOBAL_PURIFIER
        .get()
        .ok_or_else(|| PurlError::InvalidInput("global purifier is not initialized".to_string()))
}

/// 向全局引擎导入规则
pub fn import_rules(doc: &Value) -> PurlResult<ImportReport> {
    global_purifier()?.import_rules(doc)
}

/// 使用全局引擎净化；未初始化时原样返回
pub async fn purify(url: &str) -> PurificationResult {
    match global_purifier() {
        Ok(purifier) => purifier.purify(url).await,
        Err(_) => PurificationResult {
            url: url.to_string(),
            rule: None,
        },
    }
}

/// 全局引擎的累计统计；未初始化时为全零
pub fn get_statistics() -> StatisticsSnapshot {
    global_purifier()
        .map(Purifier::statistics)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 全局单例在整个测试进程内共享，只在这一个测试里使用
    #[tokio::test]
    async fn test_global_lifecycle() {
        let first = init_purifier().unwrap();
        let again = init_purifier_with_config(ConfigManager::custom().lambda_enabled(true).build()).unwrap();
        assert!(std::ptr::eq(first, again));
        assert!(!global_purifier().unwrap().config().lambda_enabled);

        let report = import_rules(&json!([{"id": "g", "providerName": "G",
            "matchPatterns": ["global.test"],
            "actions": [{"type": "removeParams", "names": ["ref"]}]}]))
        .unwrap();
        assert_eq!(report.imported, 1);

        let before = get_statistics().url_count;
        let result = purify("https://global.test/?ref=x").await;
        assert_eq!(result.url, "https://global.test/");
        assert_eq!(result.rule.as_deref(), Some("g"));
        assert_eq!(get_statistics().url_count, before + 1);
    }
}
