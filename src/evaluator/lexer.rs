//! lambda 语言词法分析

use crate::error::{PurlError, PurlResult};

/// 词法单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Assign,
    Eq,
    Ne,
    Not,
    And,
    Or,
    Plus,
    Eof,
}

/// 带位置的词法单元（字符偏移，报错用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

// 单个 lambda 体的长度上限
const MAX_SOURCE_LEN: usize = 16 * 1024;

/// 把源码切分为词法单元，末尾总是 `Token::Eof`
pub fn tokenize(source: &str) -> PurlResult<Vec<Spanned>> {
    if source.len() > MAX_SOURCE_LEN {
        return Err(syntax(0, format!("body longer than {} bytes", MAX_SOURCE_LEN)));
    }

    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let offset = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        // 注释到行尾
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ';' => Token::Semi,
            '+' => Token::Plus,
            '=' if peek(&chars, i + 1) == Some('=') => {
                i += 1;
                Token::Eq
            }
            '=' => Token::Assign,
            '!' if peek(&chars, i + 1) == Some('=') => {
                i += 1;
                Token::Ne
            }
            '!' => Token::Not,
            '&' if peek(&chars, i + 1) == Some('&') => {
                i += 1;
                Token::And
            }
            '|' if peek(&chars, i + 1) == Some('|') => {
                i += 1;
                Token::Or
            }
            '"' => {
                let (literal, next) = read_string(&chars, i)?;
                tokens.push(Spanned {
                    token: Token::Str(literal),
                    offset,
                });
                i = next;
                continue;
            }
            d if d.is_ascii_digit() || (d == '-' && peek(&chars, i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| syntax(start, format!("integer `{}` out of range", text)))?;
                tokens.push(Spanned {
                    token: Token::Int(value),
                    offset,
                });
                continue;
            }
            a if a.is_ascii_alphabetic() || a == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Spanned {
                    token: Token::Ident(chars[start..i].iter().collect()),
                    offset,
                });
                continue;
            }
            other => return Err(syntax(offset, format!("unexpected character `{}`", other))),
        };

        tokens.push(Spanned { token, offset });
        i += 1;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: chars.len(),
    });
    Ok(tokens)
}

fn peek(chars: &[char], index: usize) -> Option<char> {
    chars.get(index).copied()
}

/// 读取双引号字符串，支持 `\"` `\\` `\n` `\t` 转义；返回 (内容, 结束后的位置)
fn read_string(chars: &[char], start: usize) -> PurlResult<(String, usize)> {
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '"' => return Ok((out, i + 1)),
            '\\' => {
                let escaped = match peek(chars, i + 1) {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some(other) => return Err(syntax(i, format!("unknown escape `\\{}`", other))),
                    None => break,
                };
                out.push(escaped);
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(syntax(start, "unterminated string literal".to_string()))
}

pub(crate) fn syntax(offset: usize, message: String) -> PurlError {
    PurlError::MalformedRule(format!("lambda syntax error at {}: {}", offset, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_operators_and_literals() {
        assert_eq!(
            kinds(r#"let a = "x\"y" + -3; # comment
                     if a != "" && !b || c == 1 { }"#),
            vec![
                Token::Ident("let".into()),
                Token::Ident("a".into()),
                Token::Assign,
                Token::Str("x\"y".into()),
                Token::Plus,
                Token::Int(-3),
                Token::Semi,
                Token::Ident("if".into()),
                Token::Ident("a".into()),
                Token::Ne,
                Token::Str("".into()),
                Token::And,
                Token::Not,
                Token::Ident("b".into()),
                Token::Or,
                Token::Ident("c".into()),
                Token::Eq,
                Token::Int(1),
                Token::LBrace,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lexical_errors() {
        assert!(tokenize(r#""open"#).is_err());
        assert!(tokenize("a @ b").is_err());
        assert!(tokenize(r#""\q""#).is_err());
        assert!(tokenize("99999999999999999999").is_err());
        assert!(tokenize(&"a".repeat(MAX_SOURCE_LEN + 1)).is_err());
    }
}
