//! 动作流水线
//! 按声明顺序执行规则动作；任一动作失败则整条规则作废（由调用方回退到规则前的 URL）

use std::sync::Arc;

use tracing::{debug, trace};

use super::actions;
use crate::compiler::{CompiledAction, CompiledRule};
use crate::config::EngineConfig;
use crate::error::PurlResult;
use crate::evaluator::LambdaEvaluator;
use crate::parsed_url::ParsedUrl;

/// 流水线结束后的下一步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// 全部动作执行完毕
    Done,
    /// 遇到 followRedirect：解析重定向后在新地址上重新匹配
    FollowRedirect,
    /// extractParam 得到嵌套 URL：直接在其上重新匹配
    Reenter,
}

/// 本次执行的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineTally {
    pub params_removed: u64,
    pub decoded: u64,
}

/// 流水线执行结果
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub url: ParsedUrl,
    pub next: Continuation,
    pub tally: PipelineTally,
}

/// 动作流水线
#[derive(Clone)]
pub struct ActionPipeline {
    evaluator: Arc<dyn LambdaEvaluator>,
    lambda_enabled: bool,
    redirect_enabled: bool,
}

impl ActionPipeline {
    pub fn new(evaluator: Arc<dyn LambdaEvaluator>, config: &EngineConfig) -> Self {
        Self {
            evaluator,
            lambda_enabled: config.lambda_enabled,
            redirect_enabled: config.redirect_enabled,
        }
    }

    /// 对 URL 执行规则的全部动作
    pub fn apply(&self, url: &ParsedUrl, rule: &CompiledRule) -> PurlResult<PipelineOutcome> {
        let mut current = url.clone();
        let mut tally = PipelineTally::default();

        for action in &rule.actions {
            trace!("Rule {}: running {}", rule.id, action.kind());
            match action {
                CompiledAction::RemoveParams(names) => {
                    tally.params_removed += actions::remove_params(&mut current, names) as u64;
                }
                CompiledAction::RemoveParamsByRegex(regex) => {
                    tally.params_removed += actions::remove_params_by_regex(&mut current, regex) as u64;
                }
                CompiledAction::KeepParams(names) => {
                    tally.params_removed += actions::keep_params(&mut current, names) as u64;
                }
                CompiledAction::RewritePath { regex, replacement } => {
                    actions::rewrite_path(&mut current, regex, replacement)?;
                }
                CompiledAction::ExtractParam { name, decoders } => {
                    let target = actions::extract_param(&current, name, decoders)?;
                    tally.decoded += 1;
                    return Self::finish(target, Continuation::Reenter, tally);
                }
                CompiledAction::FollowRedirect => {
                    if !self.redirect_enabled {
                        debug!("Rule {}: redirect resolution disabled, step skipped", rule.id);
                        continue;
                    }
                    return Self::finish(current, Continuation::FollowRedirect, tally);
                }
                CompiledAction::Lambda(program) => {
                    if !self.lambda_enabled {
                        debug!("Rule {}: lambda disabled, step skipped", rule.id);
                        continue;
                    }
                    current = self.evaluator.run(program, &current)?;
                }
            }
        }

        Self::finish(current, Continuation::Done, tally)
    }

    // 结果必须能重新解析为合法 URL
    fn finish(url: ParsedUrl, next: Continuation, tally: PipelineTally) -> PurlResult<PipelineOutcome> {
        url.to_canonical_string()?;
        Ok(PipelineOutcome { url, next, tally })
    }
}
