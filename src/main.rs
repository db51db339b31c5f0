//! Hive CLI
//!
//! `hive "prompt"` 单次提问；不带参数时进入 REPL，逐行读取 stdin。Ctrl+C 取消当前请求。

use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use hive::config::load_config;
use hive::{EngineError, ExchangeAgent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let config_path = std::env::var("HIVE_CONFIG").ok().map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let agent = ExchangeAgent::from_config(&cfg).context("Failed to build exchange graph")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let answer = ask(&agent, &args.join(" ")).await?;
        println!("{}", answer);
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("hive ready. Type a question, or 'quit' to exit.");
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        match ask(&agent, line).await {
            Ok(answer) => println!("{}", answer),
            Err(e) => eprintln!("error: {:#}", e),
        }
    }
    Ok(())
}

/// 跑一次请求；期间 Ctrl+C 只取消本次请求
async fn ask(agent: &ExchangeAgent, prompt: &str) -> anyhow::Result<String> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = agent.serve_with_cancel(prompt, &cancel).await;
    watcher.abort();

    match result {
        Ok(answer) => Ok(answer),
        Err(EngineError::Cancelled) => Ok("(cancelled)".to_string()),
        Err(e) => Err(e).context("Request failed"),
    }
}
