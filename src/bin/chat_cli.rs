use anyhow::Result;
use companion_chat::{
    chat::ChatService,
    config::{self, AppConfig},
    inference::ModelHandle,
};
use std::env;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::debug_directive(false))),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::from_env();
    if env::args().skip(1).any(|arg| arg == "--no-model") {
        config.model.disabled = true;
    }

    let settings = config.model.clone();
    let model = tokio::task::spawn_blocking(move || ModelHandle::load(&settings)).await?;
    let chat = ChatService::standard(model).with_topic_shortcut(config.topic_shortcut);

    println!("Type a message, /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }

        let reply = chat.respond(&line);
        if reply.urgent {
            println!("[urgent] {}", reply.response);
        } else {
            println!("{}", reply.response);
        }
        for suggestion in reply.suggestions.iter().flatten() {
            println!("  - {suggestion}");
        }
    }

    Ok(())
}
