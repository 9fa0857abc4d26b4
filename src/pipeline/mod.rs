//! 动作流水线模块
pub mod actions;
pub mod pipeline;

// 导出核心接口
pub use self::pipeline::{ActionPipeline, Continuation, PipelineOutcome, PipelineTally};
