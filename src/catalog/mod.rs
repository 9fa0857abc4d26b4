//! 规则目录模块：写时复制的规则快照、主机索引与最优规则匹配
pub mod catalog;
pub mod index;
pub mod matcher;

// 导出核心接口
pub use self::catalog::{CatalogEntry, CatalogSnapshot, RuleCatalog};
pub use self::index::HostIndex;
pub use self::matcher::{RuleMatch, RuleMatcher};
