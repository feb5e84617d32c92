//! Sous - 多模态烹饪助手
//!
//! 入口：初始化日志、按配置构建 Orchestrator，并运行命令行 REPL。
//! 普通输入按文本查询处理；`/image <path>`、`/find <食材, ...>`、`/shop`、`/pick <n>`、`/history`、`/clear`、`/quit` 为命令。

use std::path::PathBuf;

use anyhow::Context;
use sous::agent::create_orchestrator_from_path;
use sous::core::{Orchestrator, TurnOutcome};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const HELP: &str =
    "Commands: /image <path>  /find <a, b, ...>  /shop  /pick <n>  /history  /clear  /help  /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sous::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let (cfg, orchestrator) = create_orchestrator_from_path(config_path);
    let session_id = format!("cli_{}", uuid::Uuid::new_v4());
    tracing::info!(session = %session_id, app = %cfg.app.name, "session started");

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("{} ready. {HELP}\n", cfg.app.name).as_bytes())
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match handle_line(&orchestrator, &session_id, line).await {
            Ok(Some(out)) => stdout.write_all(format!("{out}\n").as_bytes()).await?,
            Ok(None) => break,
            Err(e) => stdout.write_all(format!("error: {e:#}\n").as_bytes()).await?,
        }
    }
    Ok(())
}

/// 处理一行输入；返回 None 表示退出
async fn handle_line(
    orchestrator: &Orchestrator,
    session_id: &str,
    line: &str,
) -> anyhow::Result<Option<String>> {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };
    let outcome = match command {
        "/quit" | "/exit" => return Ok(None),
        "/help" => return Ok(Some(HELP.to_string())),
        "/image" => {
            let bytes = tokio::fs::read(arg)
                .await
                .with_context(|| format!("Failed to read image {arg}"))?;
            orchestrator.handle_ingredient_image(session_id, bytes).await
        }
        "/find" => {
            let ingredients = arg.split(',').map(str::to_string).collect();
            orchestrator.search_recipes(session_id, ingredients).await
        }
        "/shop" => orchestrator.generate_shopping_list(session_id).await,
        "/pick" => {
            let n: usize = arg.parse().context("Usage: /pick <n> (1-based)")?;
            orchestrator.select_recipe(session_id, n.saturating_sub(1)).await
        }
        "/history" => {
            let history = orchestrator.conversation_history(session_id).await;
            return Ok(Some(serde_json::to_string_pretty(&history)?));
        }
        "/clear" => {
            orchestrator.clear_session(session_id).await;
            return Ok(Some("Session cleared.".to_string()));
        }
        _ => orchestrator.handle_text_query(session_id, line).await,
    };
    render(&outcome).map(Some)
}

fn render(outcome: &TurnOutcome) -> anyhow::Result<String> {
    tracing::debug!(trace = ?outcome.trace.states(), "turn finished");
    Ok(serde_json::to_string_pretty(&outcome.envelope)?)
}
