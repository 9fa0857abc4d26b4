//! 引擎配置管理，存储所有可配置项
//! 默认值偏向安全：自定义逻辑（lambda）与网络重定向解析均需显式开启

use std::time::Duration;

/// 默认 User-Agent（重定向解析请求使用）
pub const DEFAULT_USER_AGENT: &str = concat!("rspurlfy/", env!("CARGO_PKG_VERSION"));

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // 是否允许执行规则中的 lambda 动作
    pub lambda_enabled: bool,
    // 是否允许发起网络请求解析重定向
    pub redirect_enabled: bool,
    // 单次重定向解析的最大跳数
    pub max_redirect_hops: usize,
    // 单跳请求超时
    pub redirect_timeout: Duration,
    // lambda 墙钟时间预算
    pub lambda_time_budget: Duration,
    // lambda 步数预算
    pub lambda_step_budget: u64,
    // lambda 语法嵌套/递归深度上限
    pub lambda_max_depth: usize,
    // 单次净化中重新进入匹配器的最大次数
    pub max_iterations: usize,
    // 重定向请求的 User-Agent
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lambda_enabled: false,
            redirect_enabled: false,
            max_redirect_hops: 5,
            redirect_timeout: Duration::from_secs(4),
            lambda_time_budget: Duration::from_millis(50),
            lambda_step_budget: 10_000,
            lambda_max_depth: 64,
            max_iterations: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> EngineConfig {
        EngineConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: EngineConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn lambda_enabled(mut self, enabled: bool) -> Self {
        self.config.lambda_enabled = enabled;
        self
    }

    pub fn redirect_enabled(mut self, enabled: bool) -> Self {
        self.config.redirect_enabled = enabled;
        self
    }

    pub fn max_redirect_hops(mut self, hops: usize) -> Self {
        self.config.max_redirect_hops = hops;
        self
    }

    pub fn redirect_timeout(mut self, timeout: Duration) -> Self {
        self.config.redirect_timeout = timeout;
        self
    }

    pub fn lambda_time_budget(mut self, budget: Duration) -> Self {
        self.config.lambda_time_budget = budget;
        self
    }

    pub fn lambda_step_budget(mut self, steps: u64) -> Self {
        self.config.lambda_step_budget = steps;
        self
    }

    pub fn lambda_max_depth(mut self, depth: usize) -> Self {
        self.config.lambda_max_depth = depth;
        self
    }

    pub fn max_iterations(mut self, iterations: usize) -> Self {
        // 至少允许一次匹配
        self.config.max_iterations = iterations.max(1);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_favor_safety() {
        let config = ConfigManager::get_default();
        assert!(!config.lambda_enabled);
        assert!(!config.redirect_enabled);
        assert_eq!(config.max_redirect_hops, 5);
        assert!(config.lambda_time_budget <= Duration::from_millis(50));
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConfigManager::custom()
            .lambda_enabled(true)
            .redirect_enabled(true)
            .max_redirect_hops(2)
            .max_iterations(0)
            .user_agent("test-agent")
            .build();
        assert!(config.lambda_enabled);
        assert!(config.redirect_enabled);
        assert_eq!(config.max_redirect_hops, 2);
        assert_eq!(config.max_iterations, 1);
        assert_eq!(config.user_agent, "test-agent");
    }
}
