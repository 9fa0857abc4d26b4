//! lambda 语言语法分析
//! 递归下降，导入期完成全部静态校验：未知函数、参数个数、嵌套深度、字面量正则

use std::collections::HashSet;

use regex::RegexBuilder;

use super::lexer::{syntax, tokenize, Spanned, Token};
use crate::error::PurlResult;

/// 表达式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Str(String),
    Int(i64),
    Bool(bool),
    Var(String),
    Call { name: String, args: Vec<Expr> },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Concat(Vec<Expr>),
}

/// 语句
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Let { name: String, value: Expr },
    If { cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt> },
    Command { name: String, args: Vec<Expr> },
}

/// 只读内置变量
pub const BUILTIN_VARS: &[&str] = &["scheme", "host", "path", "query", "fragment"];

/// 可变参数个数上限的占位
const VARIADIC: usize = usize::MAX;

/// 语句位置可用的命令：(名称, 最少参数, 最多参数)
pub const COMMANDS: &[(&str, usize, usize)] = &[
    ("set_param", 2, 2),
    ("remove_param", 1, 1),
    ("keep_params", 1, VARIADIC),
    ("set_path", 1, 1),
    ("set_host", 1, 1),
    ("set_fragment", 1, 1),
    ("clear_fragment", 0, 0),
    ("set_url", 1, 1),
];

/// 表达式位置可用的纯函数：(名称, 最少参数, 最多参数)
pub const FUNCTIONS: &[(&str, usize, usize)] = &[
    ("param", 1, 1),
    ("has_param", 1, 1),
    ("base64_decode", 1, 1),
    ("url_decode", 1, 1),
    ("url_encode", 1, 1),
    ("lower", 1, 1),
    ("upper", 1, 1),
    ("replace", 3, 3),
    ("split", 3, 3),
    ("substr", 3, 3),
    ("contains", 2, 2),
    ("starts_with", 2, 2),
    ("ends_with", 2, 2),
    ("len", 1, 1),
];

const RESERVED: &[&str] = &["let", "if", "else", "true", "false"];

/// 解析整段 lambda 体
pub fn parse_program(source: &str, max_depth: usize) -> PurlResult<Vec<Stmt>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
        declared: BUILTIN_VARS.iter().map(|v| v.to_string()).collect(),
    };
    let mut program = Vec::new();
    while !parser.at(&Token::Eof) {
        program.push(parser.statement()?);
    }
    Ok(program)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    max_depth: usize,
    declared: HashSet<String>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == keyword)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: Token) -> PurlResult<()> {
        if self.at(&token) {
            self.advance();
            Ok(())
        } else {
            Err(syntax(
                self.offset(),
                format!("expected {:?}, found {:?}", token, self.peek()),
            ))
        }
    }

    fn ident(&mut self) -> PurlResult<String> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(syntax(self.offset(), format!("expected identifier, found {:?}", other))),
        }
    }

    fn enter(&mut self) -> PurlResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(syntax(
                self.offset(),
                format!("nesting deeper than {}", self.max_depth),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn statement(&mut self) -> PurlResult<Stmt> {
        self.enter()?;
        let stmt = if self.at_keyword("let") {
            self.let_statement()
        } else if self.at_keyword("if") {
            self.if_statement()
        } else {
            self.command_statement()
        };
        self.leave();
        stmt
    }

    fn let_statement(&mut self) -> PurlResult<Stmt> {
        self.advance();
        let offset = self.offset();
        let name = self.ident()?;
        if RESERVED.contains(&name.as_str()) || BUILTIN_VARS.contains(&name.as_str()) {
            return Err(syntax(offset, format!("`{}` cannot be rebound", name)));
        }
        self.expect(Token::Assign)?;
        let value = self.expression()?;
        self.expect(Token::Semi)?;
        self.declared.insert(name.clone());
        Ok(Stmt::Let { name, value })
    }

    fn if_statement(&mut self) -> PurlResult<Stmt> {
        self.advance();
        let cond = self.expression()?;
        let then = self.block()?;
        let otherwise = if self.at_keyword("else") {
            self.advance();
            if self.at_keyword("if") {
                vec![self.statement()?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If { cond, then, otherwise })
    }

    fn block(&mut self) -> PurlResult<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        let mut body = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.at(&Token::Eof) {
                return Err(syntax(self.offset(), "unterminated block".to_string()));
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn command_statement(&mut self) -> PurlResult<Stmt> {
        let offset = self.offset();
        let name = self.ident()?;
        let Some(&(_, min, max)) = COMMANDS.iter().find(|(n, _, _)| *n == name) else {
            return Err(syntax(offset, format!("unknown command `{}`", name)));
        };
        let args = self.arguments()?;
        check_arity(offset, &name, args.len(), min, max)?;
        self.expect(Token::Semi)?;
        Ok(Stmt::Command { name, args })
    }

    fn arguments(&mut self) -> PurlResult<Vec<Expr>> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.at(&Token::RParen) {
            loop {
                args.push(self.expression()?);
                if self.at(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn expression(&mut self) -> PurlResult<Expr> {
        self.enter()?;
        let expr = self.or_expr();
        self.leave();
        expr
    }

    fn or_expr(&mut self) -> PurlResult<Expr> {
        let mut left = self.and_expr()?;
        while self.at(&Token::Or) {
            self.advance();
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> PurlResult<Expr> {
        let mut left = self.cmp_expr()?;
        while self.at(&Token::And) {
            self.advance();
            let right = self.cmp_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn cmp_expr(&mut self) -> PurlResult<Expr> {
        let left = self.sum_expr()?;
        if self.at(&Token::Eq) {
            self.advance();
            let right = self.sum_expr()?;
            return Ok(Expr::Eq(Box::new(left), Box::new(right)));
        }
        if self.at(&Token::Ne) {
            self.advance();
            let right = self.sum_expr()?;
            return Ok(Expr::Ne(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn sum_expr(&mut self) -> PurlResult<Expr> {
        let first = self.unary_expr()?;
        if !self.at(&Token::Plus) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.at(&Token::Plus) {
            self.advance();
            parts.push(self.unary_expr()?);
        }
        Ok(Expr::Concat(parts))
    }

    fn unary_expr(&mut self) -> PurlResult<Expr> {
        if self.at(&Token::Not) {
            self.advance();
            self.enter()?;
            let inner = self.unary_expr();
            self.leave();
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> PurlResult<Expr> {
        let offset = self.offset();
        match self.advance() {
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Int(i) => Ok(Expr::Int(i)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if name == "true" => Ok(Expr::Bool(true)),
            Token::Ident(name) if name == "false" => Ok(Expr::Bool(false)),
            Token::Ident(name) if self.at(&Token::LParen) => {
                let Some(&(_, min, max)) = FUNCTIONS.iter().find(|(n, _, _)| *n == name) else {
                    return Err(syntax(offset, format!("unknown function `{}`", name)));
                };
                let args = self.arguments()?;
                check_arity(offset, &name, args.len(), min, max)?;
                if name == "replace" {
                    check_literal_regex(offset, &args[1])?;
                }
                Ok(Expr::Call { name, args })
            }
            Token::Ident(name) => {
                if !self.declared.contains(&name) {
                    return Err(syntax(offset, format!("unknown variable `{}`", name)));
                }
                Ok(Expr::Var(name))
            }
            other => Err(syntax(offset, format!("unexpected token {:?}", other))),
        }
    }
}

fn check_arity(offset: usize, name: &str, got: usize, min: usize, max: usize) -> PurlResult<()> {
    if got < min || got > max {
        let expected = if max == VARIADIC {
            format!("at least {}", min)
        } else if min == max {
            min.to_string()
        } else {
            format!("{}..={}", min, max)
        };
        return Err(syntax(
            offset,
            format!("`{}` takes {} argument(s), got {}", name, expected, got),
        ));
    }
    Ok(())
}

/// 字面量正则在导入期编译一次，错误即规则错误
fn check_literal_regex(offset: usize, pattern: &Expr) -> PurlResult<()> {
    if let Expr::Str(source) = pattern {
        RegexBuilder::new(source)
            .size_limit(super::interpreter::REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| syntax(offset, format!("invalid regex in replace(): {}", e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statements() {
        let program = parse_program(
            r#"
            let target = param("u");
            if has_param("u") && target != "" {
                set_url(url_decode(target));
            } else if host == "a.com" {
                remove_param("x");
            } else {
                keep_params("id", "p");
            }
            "#,
            64,
        )
        .unwrap();
        assert_eq!(program.len(), 2);
        assert!(matches!(&program[0], Stmt::Let { name, .. } if name == "target"));
        let Stmt::If { otherwise, .. } = &program[1] else {
            panic!("expected if statement");
        };
        assert!(matches!(otherwise[0], Stmt::If { .. }));
    }

    #[test]
    fn test_concat_and_precedence() {
        let program = parse_program(r#"set_path("/" + lower(path) + "x");"#, 64).unwrap();
        let Stmt::Command { args, .. } = &program[0] else {
            panic!("expected command");
        };
        assert!(matches!(&args[0], Expr::Concat(parts) if parts.len() == 3));
    }

    #[test]
    fn test_static_checks() {
        assert!(parse_program("explode();", 64).is_err());
        assert!(parse_program("set_param(\"a\");", 64).is_err());
        assert!(parse_program("set_path(nope);", 64).is_err());
        assert!(parse_program("let host = \"x\";", 64).is_err());
        assert!(parse_program("set_path(upper(\"a\", \"b\"));", 64).is_err());
        assert!(parse_program("set_path(replace(path, \"(\", \"\"));", 64).is_err());
        assert!(parse_program("keep_params();", 64).is_err());
        assert!(parse_program("remove_param(\"a\")", 64).is_err());
        assert!(parse_program("if true { clear_fragment();", 64).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("set_path({}\"x\"{});", "(".repeat(40), ")".repeat(40));
        assert!(parse_program(&deep, 64).is_ok());
        assert!(parse_program(&deep, 16).is_err());
        let nots = format!("if {}true {{ clear_fragment(); }}", "!".repeat(100));
        assert!(parse_program(&nots, 64).is_err());
    }

    #[test]
    fn test_empty_program() {
        assert!(parse_program("  # nothing\n", 64).unwrap().is_empty());
    }
}
