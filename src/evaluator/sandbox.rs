//! 受限求值器
//! lambda 体在导入期编译为 `LambdaProgram`；执行时只能读写传入 URL 的副本

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::interpreter::{execute, Budget};
use super::parser::{parse_program, Stmt};
use crate::config::EngineConfig;
use crate::error::PurlResult;
use crate::parsed_url::ParsedUrl;

/// 编译后的 lambda 程序（可在线程间共享）
#[derive(Clone)]
pub struct LambdaProgram {
    body: Arc<str>,
    statements: Arc<Vec<Stmt>>,
}

impl LambdaProgram {
    /// 解析并静态校验，失败为 `MalformedRule`
    pub fn compile(body: &str, max_depth: usize) -> PurlResult<Self> {
        let statements = parse_program(body, max_depth)?;
        Ok(Self {
            body: Arc::from(body),
            statements: Arc::new(statements),
        })
    }

    /// 原始源码
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }
}

impl fmt::Debug for LambdaProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaProgram")
            .field("body_len", &self.body.len())
            .field("statements", &self.statements.len())
            .finish()
    }
}

/// lambda 求值接口
/// 实现必须保证：除返回值外没有任何可观察的副作用
pub trait LambdaEvaluator: Send + Sync {
    fn run(&self, lambda: &LambdaProgram, url: &ParsedUrl) -> PurlResult<ParsedUrl>;
}

/// 执行限制
#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub time_budget: Duration,
    pub step_budget: u64,
    pub max_depth: usize,
}

impl From<&EngineConfig> for SandboxLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            time_budget: config.lambda_time_budget,
            step_budget: config.lambda_step_budget,
            max_depth: config.lambda_max_depth,
        }
    }
}

/// 默认求值器：解释执行内置的小型语言
#[derive(Debug, Clone)]
pub struct SandboxEvaluator {
    limits: SandboxLimits,
}

impl SandboxEvaluator {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(SandboxLimits::from(config))
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }
}

impl LambdaEvaluator for SandboxEvaluator {
    fn run(&self, lambda: &LambdaProgram, url: &ParsedUrl) -> PurlResult<ParsedUrl> {
        let budget = Budget {
            steps: self.limits.step_budget,
            time: self.limits.time_budget,
            max_depth: self.limits.max_depth,
        };
        let result = execute(lambda.statements(), url, budget);
        if let Err(e) = &result {
            debug!("Lambda evaluation failed: {}", e);
        }
        result
    }
}
