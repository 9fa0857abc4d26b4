//! 编译模块：将规则条目编译为可执行的匹配模式与动作
pub mod pattern;
pub mod compiler;

pub use self::pattern::{
    CompiledAction, CompiledMatcher, CompiledRule, HostMatcher, PathMatcher, Specificity,
};
pub use self::compiler::{CompiledBatch, RuleCompiler};
