//! lambda 解释器
//! 只持有当前 URL 的一份拷贝；每个语句/表达式节点消耗一步，并检查墙钟截止时间

use std::collections::HashMap;
use std::time::{Duration, Instant};

use regex::{Regex, RegexBuilder};
use url::form_urlencoded;

use super::parser::{Expr, Stmt};
use crate::error::{PurlError, PurlResult};
use crate::parsed_url::ParsedUrl;
use crate::utils::{Decoder, ReplacementTemplate};

/// `replace()` 内正则的编译体积上限
pub const REGEX_SIZE_LIMIT: usize = 1 << 20;
/// 单个字符串值的长度上限
pub const MAX_VALUE_LEN: usize = 64 * 1024;
/// `replace()` 单次展开前允许的最坏长度
const MAX_EXPANSION_LEN: usize = 4 * MAX_VALUE_LEN;

/// 执行预算
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub steps: u64,
    pub time: Duration,
    pub max_depth: usize,
}

/// 运行期值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    fn into_string(self) -> String {
        match self {
            Value::Str(s) => s,
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Int(i) => *i != 0,
            Value::Bool(b) => *b,
        }
    }

    fn as_int(&self, what: &str) -> PurlResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| PurlError::Transform(format!("{} expects an integer, got `{}`", what, s))),
            Value::Bool(_) => Err(PurlError::Transform(format!("{} expects an integer, got a bool", what))),
        }
    }
}

/// 在预算内执行程序，返回修改后的 URL
pub fn execute(program: &[Stmt], url: &ParsedUrl, budget: Budget) -> PurlResult<ParsedUrl> {
    let mut interpreter = Interpreter {
        url: url.clone(),
        vars: HashMap::new(),
        steps_left: budget.steps,
        deadline: Instant::now() + budget.time,
        depth: 0,
        max_depth: budget.max_depth,
    };
    interpreter.block(program)?;
    Ok(interpreter.url)
}

struct Interpreter {
    url: ParsedUrl,
    vars: HashMap<String, Value>,
    steps_left: u64,
    deadline: Instant,
    depth: usize,
    max_depth: usize,
}

impl Interpreter {
    fn tick(&mut self) -> PurlResult<()> {
        if self.steps_left == 0 {
            return Err(PurlError::EvaluationTimeout("step budget exhausted".to_string()));
        }
        self.steps_left -= 1;
        if Instant::now() >= self.deadline {
            return Err(PurlError::EvaluationTimeout("time budget exhausted".to_string()));
        }
        Ok(())
    }

    fn descend(&mut self) -> PurlResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(PurlError::EvaluationTimeout(format!(
                "recursion deeper than {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn block(&mut self, stmts: &[Stmt]) -> PurlResult<()> {
        for stmt in stmts {
            self.descend()?;
            let result = self.statement(stmt);
            self.depth -= 1;
            result?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> PurlResult<()> {
        self.tick()?;
        match stmt {
            Stmt::Let { name, value } => {
                let value = self.eval(value)?;
                self.vars.insert(name.clone(), value);
                Ok(())
            }
            Stmt::If { cond, then, otherwise } => {
                if self.eval(cond)?.truthy() {
                    self.block(then)
                } else {
                    self.block(otherwise)
                }
            }
            Stmt::Command { name, args } => self.command(name, args),
        }
    }

    fn command(&mut self, name: &str, args: &[Expr]) -> PurlResult<()> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?.into_string());
        }

        match name {
            "set_param" => self.url.set_param(&values[0], &values[1]),
            "remove_param" => {
                self.url.remove_params_where(|n| n == values[0]);
            }
            "keep_params" => {
                self.url.remove_params_where(|n| !values.iter().any(|keep| keep == n));
            }
            "set_path" => {
                let path = &values[0];
                if self.url.has_authority && !path.is_empty() && !path.starts_with('/') {
                    return Err(PurlError::Transform(format!("path `{}` must start with `/`", path)));
                }
                self.url.path = path.clone();
            }
            "set_host" => {
                if !self.url.has_authority || values[0].is_empty() {
                    return Err(PurlError::Transform(format!("cannot set host `{}`", values[0])));
                }
                self.url.host = Some(values[0].clone());
            }
            "set_fragment" => self.url.fragment = Some(values[0].clone()),
            "clear_fragment" => self.url.fragment = None,
            "set_url" => {
                self.url = ParsedUrl::parse(&values[0])
                    .map_err(|e| PurlError::Transform(format!("set_url(): {}", e)))?;
            }
            other => return Err(PurlError::Transform(format!("unknown command `{}`", other))),
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> PurlResult<Value> {
        self.tick()?;
        self.descend()?;
        let result = self.eval_inner(expr);
        self.depth -= 1;
        let value = result?;
        if let Value::Str(s) = &value {
            if s.len() > MAX_VALUE_LEN {
                return Err(PurlError::Transform(format!(
                    "string value longer than {} bytes",
                    MAX_VALUE_LEN
                )));
            }
        }
        Ok(value)
    }

    fn eval_inner(&mut self, expr: &Expr) -> PurlResult<Value> {
        match expr {
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Var(name) => self.variable(name),
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner)?.truthy())),
            // 短路求值
            Expr::And(left, right) => {
                if !self.eval(left)?.truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right)?.truthy()))
            }
            Expr::Or(left, right) => {
                if self.eval(left)?.truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right)?.truthy()))
            }
            Expr::Eq(left, right) => Ok(Value::Bool(self.equal(left, right)?)),
            Expr::Ne(left, right) => Ok(Value::Bool(!self.equal(left, right)?)),
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&self.eval(part)?.into_string());
                    if out.len() > MAX_VALUE_LEN {
                        return Err(PurlError::Transform("concatenation too long".to_string()));
                    }
                }
                Ok(Value::Str(out))
            }
            Expr::Call { name, args } => self.call(name, args),
        }
    }

    fn equal(&mut self, left: &Expr, right: &Expr) -> PurlResult<bool> {
        let left = self.eval(left)?;
        let right = self.eval(right)?;
        Ok(match (left, right) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (a, b) => a.into_string() == b.into_string(),
        })
    }

    fn variable(&self, name: &str) -> PurlResult<Value> {
        let value = match name {
            "scheme" => self.url.scheme.clone(),
            "host" => self.url.host.clone().unwrap_or_default(),
            "path" => self.url.path.clone(),
            "query" => self.url.query_string(),
            "fragment" => self.url.fragment.clone().unwrap_or_default(),
            _ => {
                return self
                    .vars
                    .get(name)
                    .cloned()
                    .ok_or_else(|| PurlError::Transform(format!("variable `{}` is unbound", name)));
            }
        };
        Ok(Value::Str(value))
    }

    /// 逐个匹配展开替换；输出超过上限或越过截止时间立即中止
    fn replace_bounded(&self, regex: &Regex, haystack: &str, template: &str) -> PurlResult<String> {
        // 每个 `$` 引用展开后不超过整个匹配的长度
        let refs = template.matches('$').count();
        let mut out = String::with_capacity(haystack.len().min(MAX_VALUE_LEN));
        let mut last = 0;
        for caps in regex.captures_iter(haystack) {
            if Instant::now() >= self.deadline {
                return Err(PurlError::EvaluationTimeout("time budget exhausted in replace()".to_string()));
            }
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&haystack[last..whole.start()]);
            let ceiling = out.len() + template.len() + refs.saturating_mul(whole.len());
            if ceiling > MAX_EXPANSION_LEN {
                return Err(PurlError::Transform(format!(
                    "replace() result longer than {} bytes",
                    MAX_VALUE_LEN
                )));
            }
            caps.expand(template, &mut out);
            if out.len() > MAX_VALUE_LEN {
                return Err(PurlError::Transform(format!(
                    "replace() result longer than {} bytes",
                    MAX_VALUE_LEN
                )));
            }
            last = whole.end();
        }
        out.push_str(&haystack[last..]);
        Ok(out)
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> PurlResult<Value> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        let text = |index: usize| values[index].clone().into_string();

        let value = match name {
            "param" => Value::Str(self.url.first_param(&text(0)).unwrap_or_default()),
            "has_param" => Value::Bool(self.url.has_param(&text(0))),
            "base64_decode" => Value::Str(Decoder::Base64.apply(&text(0))?),
            "url_decode" => Value::Str(Decoder::Url.apply(&text(0))?),
            "url_encode" => Value::Str(form_urlencoded::byte_serialize(text(0).as_bytes()).collect()),
            "lower" => Value::Str(text(0).to_lowercase()),
            "upper" => Value::Str(text(0).to_uppercase()),
            "replace" => {
                let regex = RegexBuilder::new(&text(1))
                    .size_limit(REGEX_SIZE_LIMIT)
                    .build()
                    .map_err(|e| PurlError::Transform(format!("replace(): {}", e)))?;
                let template = ReplacementTemplate::normalize(&text(2));
                Value::Str(self.replace_bounded(&regex, &text(0), template.as_str())?)
            }
            "split" => {
                let index = values[2].as_int("split()")?;
                let source = text(0);
                let separator = text(1);
                if separator.is_empty() {
                    return Err(PurlError::Transform("split() separator is empty".to_string()));
                }
                let part = usize::try_from(index)
                    .ok()
                    .and_then(|i| source.split(separator.as_str()).nth(i))
                    .unwrap_or_default();
                Value::Str(part.to_string())
            }
            "substr" => {
                let start = values[1].as_int("substr()")?.max(0) as usize;
                let len = values[2].as_int("substr()")?.max(0) as usize;
                Value::Str(text(0).chars().skip(start).take(len).collect())
            }
            "contains" => Value::Bool(text(0).contains(text(1).as_str())),
            "starts_with" => Value::Bool(text(0).starts_with(text(1).as_str())),
            "ends_with" => Value::Bool(text(0).ends_with(text(1).as_str())),
            "len" => Value::Int(text(0).chars().count() as i64),
            other => return Err(PurlError::Transform(format!("unknown function `{}`", other))),
        };
        Ok(value)
    }
}
