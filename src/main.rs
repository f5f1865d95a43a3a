//! Jarvis 入口：初始化日志、加载配置，在标准输入上运行文本 REPL（代替语音采集）。
//!
//! 命令：stop / quit 退出，stats 输出统计（JSON），clear 清空对话历史；其余输入作为一个回合。

use anyhow::Context;
use jarvis::{config::load_config, observability, Jarvis};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = match load_config(std::env::args().nth(1).map(Into::into)) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "config load failed, using defaults");
            Default::default()
        }
    };
    let name = cfg.app.name.clone();
    let mut jarvis = Jarvis::from_config(&cfg).context("Failed to assemble tools")?;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout
        .write_all(format!("{name} online. Type 'stop' to exit.\n").as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };

        let reply = match line.trim().to_lowercase().as_str() {
            "" => continue,
            "stop" | "quit" | "exit" => {
                stdout
                    .write_all(format!("{}\n", jarvis.farewell()).as_bytes())
                    .await?;
                break;
            }
            "stats" => serde_json::to_string_pretty(&jarvis.stats())?,
            "clear" => {
                jarvis.clear_history();
                "Conversation history cleared.".to_string()
            }
            _ => match jarvis.process_text_command(&line).await {
                Some(reply) => reply,
                None => continue,
            },
        };
        stdout.write_all(format!("{name}: {reply}\n").as_bytes()).await?;
    }

    Ok(())
}
