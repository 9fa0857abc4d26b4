//! rspurlfy 命令行：导入规则文件并并发净化命令行给出的 URL
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rspurlfy::{ConfigManager, ParsedUrl, Purifier, RuleMatcher};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rspurlfy", author, version, about)]
struct Cli {
    /// 规则文件（可重复，按顺序导入，后者覆盖同 id 规则）
    #[arg(long = "rules", short = 'r', required = true)]
    rules: Vec<PathBuf>,

    /// 允许执行规则中的 lambda 动作
    #[arg(long)]
    lambda: bool,

    /// 允许发起网络请求解析短链重定向
    #[arg(long)]
    redirect: bool,

    /// 单跳重定向超时（秒）
    #[arg(long, default_value_t = 4)]
    timeout: u64,

    /// 以 JSON 输出结果与统计
    #[arg(long)]
    json: bool,

    /// 列出每个 URL 命中的全部规则（按优先顺序）
    #[arg(long)]
    explain: bool,

    /// 待净化的 URL
    #[arg(required = true)]
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = ConfigManager::custom()
        .lambda_enabled(args.lambda)
        .redirect_enabled(args.redirect)
        .redirect_timeout(std::time::Duration::from_secs(args.timeout))
        .build();
    let purifier = Purifier::new(config).context("failed to build purifier")?;

    let mut imported = 0;
    for path in &args.rules {
        let report = purifier
            .import_rules_file(path)
            .await
            .with_context(|| format!("failed to import {}", path.display()))?;
        for error in &report.errors {
            eprintln!("{}: skipped {}", path.display(), error);
        }
        imported += report.imported;
    }
    if imported == 0 {
        bail!("no usable rules were imported");
    }

    let urls: Vec<&str> = args.urls.iter().map(String::as_str).collect();
    if args.explain {
        explain(&purifier, &urls);
    }
    let results = tokio::select! {
        results = purifier.purify_all(&urls) => results,
        _ = tokio::signal::ctrl_c() => bail!("interrupted"),
    };
    let stats = purifier.statistics();

    if args.json {
        let output = serde_json::json!({ "results": results, "statistics": stats });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for (original, result) in urls.iter().zip(&results) {
            let rule = result.rule.as_deref().unwrap_or("-");
            println!("{} -> {} ({})", original, result.url, rule);
        }
        println!("urls: {}, chars removed: {}", stats.url_count, stats.char_removed);
    }
    Ok(())
}

fn explain(purifier: &Purifier, urls: &[&str]) {
    let snapshot = purifier.catalog().snapshot();
    for url in urls {
        let Ok(parsed) = ParsedUrl::parse(url) else {
            eprintln!("{}: not a parseable URL", url);
            continue;
        };
        let matches = RuleMatcher::find_all(&snapshot, &parsed);
        if matches.is_empty() {
            eprintln!("{}: no rule matches", url);
        }
        for (rank, found) in matches.iter().enumerate() {
            eprintln!(
                "{}: #{} {} (priority {}, {:?}, seq {})",
                url,
                rank + 1,
                found.rule.id,
                found.rule.priority,
                found.specificity,
                found.seq
            );
        }
    }
}
