//! 净化模块：引擎门面与全局单例
pub mod global;
pub mod purifier;

// 导出核心接口
pub use self::global::{
    get_statistics, global_purifier, import_rules, init_purifier, init_purifier_with_config, purify,
};
pub use self::purifier::{PurificationResult, Purifier, PurifierBuilder};
