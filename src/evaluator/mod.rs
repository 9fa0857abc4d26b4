//! lambda 动作的受限求值
//! 词法 → 语法（导入期静态校验）→ 带步数/时间预算的解释执行
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod sandbox;

// 导出核心接口
pub use self::interpreter::Budget;
pub use self::sandbox::{LambdaEvaluator, LambdaProgram, SandboxEvaluator, SandboxLimits};
