//! 全局错误类型定义
//! 规则导入、动作执行、沙箱求值、重定向解析共用同一个错误枚举

use thiserror::Error;
use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum PurlError {
    // 规则相关错误（逐条上报，不中断整批导入）
    #[error("malformed rule: {0}")]
    MalformedRule(String),
    #[error("rule document rejected: {0}")]
    RuleDocumentError(String),

    // 动作执行错误（降级为“规则未生效”）
    #[error("transform failed: {0}")]
    Transform(String),
    #[error("lambda evaluation exceeded its budget: {0}")]
    EvaluationTimeout(String),

    // 重定向解析错误（仅内部使用，从不向 purify 调用方暴露）
    #[error("redirect resolution failed: {0}")]
    RedirectResolution(String),

    // 编译相关错误
    #[error("regex compilation failed: {0}")]
    RegexCompileError(#[from] RegexError),

    // 网络相关错误
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    // 序列化/反序列化错误
    #[error("json parse failed: {0}")]
    JsonError(#[from] SerdeJsonError),

    // 基础错误
    #[error("io operation failed: {0}")]
    IoError(#[from] IoError),
    #[error("url parse failed: {0}")]
    UrlError(#[from] UrlParseError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PurlError {
    /// 是否属于“动作执行期”错误：命中后整条规则视为未生效
    pub fn is_transform_failure(&self) -> bool {
        matches!(
            self,
            PurlError::Transform(_)
                | PurlError::EvaluationTimeout(_)
                | PurlError::RegexCompileError(_)
                | PurlError::UrlError(_)
        )
    }
}

// 全局Result类型
pub type PurlResult<T> = Result<T, PurlError>;
