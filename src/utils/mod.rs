//! 工具模块：解码器链、替换模板规范化
pub mod decoder;
pub mod template;

// 导出核心接口
pub use self::decoder::Decoder;
pub use self::template::ReplacementTemplate;
