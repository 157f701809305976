use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use companion_chat::api::{self, page::HomePage, AppState};
use companion_chat::chat::ChatService;
use companion_chat::config::{self, AppConfig};
use companion_chat::inference::ModelHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // -----------------------------
    // Logging
    // -----------------------------
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::debug_directive(config::debug_from_env())));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    let addr = config.bind_addr()?;

    // -----------------------------
    // Model (blocks readiness, never fatal)
    // -----------------------------
    let model_settings = config.model.clone();
    let model = tokio::task::spawn_blocking(move || ModelHandle::load(&model_settings))
        .await
        .context("model loader task failed")?;

    // -----------------------------
    // Shared state
    // -----------------------------
    let chat = ChatService::standard(model).with_topic_shortcut(config.topic_shortcut);
    let state = AppState {
        chat: Arc::new(chat),
        page: Arc::new(HomePage::load(&config.template_dir)),
    };

    let app = api::router(state);

    info!(debug = config.debug, "HTTP listening on http://{addr}");
    info!("Chat endpoint at http://{addr}/chat");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
