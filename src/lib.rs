//! rspurlfy - 基于规则的 URL 净化引擎
//! 去除跟踪参数、解析短链重定向、执行受限的自定义改写逻辑

// 导出全局错误类型
pub use self::error::{PurlError, PurlResult};

// 导出配置模块
pub use self::config::{ConfigManager, CustomConfigBuilder, EngineConfig};

// 导出规则模块核心接口
pub use self::rule::{ActionSpec, ImportReport, MatchPatternSpec, RuleEntry, RuleLoader};

// 导出 URL 模型
pub use self::parsed_url::{ParsedUrl, QueryPair};

// 导出编译与目录模块核心接口
pub use self::compiler::{CompiledRule, RuleCompiler, Specificity};
pub use self::catalog::{CatalogSnapshot, RuleCatalog, RuleMatcher};

// 导出执行相关接口
pub use self::pipeline::{ActionPipeline, PipelineOutcome};
pub use self::redirect::{Hop, HopFetcher, HttpHopFetcher, RedirectResolver};
pub use self::evaluator::{LambdaEvaluator, LambdaProgram, SandboxEvaluator};
pub use self::stats::{StatisticsCounter, StatisticsSnapshot};

// 导出净化引擎（含全局单例的简化接口）
pub use self::purifier::{
    Purifier,
    PurifierBuilder,
    PurificationResult,
    init_purifier,
    init_purifier_with_config,
    global_purifier,
    import_rules,
    purify,
    get_statistics,
};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod parsed_url;
pub mod utils;
pub mod compiler;
pub mod catalog;
pub mod pipeline;
pub mod redirect;
pub mod evaluator;
pub mod stats;
pub mod purifier;
