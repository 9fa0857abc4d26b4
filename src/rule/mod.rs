//! 规则模块：负责规则导入文档的数据模型与解析
pub mod model;
pub mod loader;

// 导出核心接口
pub use self::model::{ActionSpec, ImportReport, MatchPatternSpec, PatternFields, RuleEntry};
pub use self::loader::RuleLoader;
