//! 替换模板规范化
//! 规则作者常用 `\1` 或 `$1` 引用分组；统一转换为 regex crate 的 `${1}` 形式，
//! 避免 `$1abc` 被解析成名为 `1abc` 的分组

/// 替换模板工具类
pub struct ReplacementTemplate;

impl ReplacementTemplate {
    /// 把 `\N` / `$N` 规范化为 `${N}`，其他内容（`$$`、`${name}`、`$name`）原样保留
    pub fn normalize(template: &str) -> String {
        let chars: Vec<char> = template.chars().collect();
        let mut out = String::with_capacity(template.len() + 8);
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\\' | '$' if i + 1 < chars.len() && chars[i + 1].is_ascii_digit() => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && chars[end].is_ascii_digit() {
                        end += 1;
                    }
                    out.push_str("${");
                    out.extend(&chars[start..end]);
                    out.push('}');
                    i = end;
                }
                '$' if i + 1 < chars.len() && chars[i + 1] == '$' => {
                    out.push_str("$$");
                    i += 2;
                }
                '\\' if i + 1 < chars.len() && chars[i + 1] == '\\' => {
                    out.push('\\');
                    i += 2;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        out
    }
}
