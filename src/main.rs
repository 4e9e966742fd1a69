use anyhow::Result;

use doc_qa::config::AppConfig;
use doc_qa::setup::Components;
use doc_qa::telemetry::init_tracing;
use doc_qa::web::chat::{self, SESSION_IDLE_TIMEOUT};
use doc_qa::web::{self, AppState, CHAT_ADDR};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    let config = AppConfig::from_env()?;
    let components = Components::from_config(&config).await?;
    tracing::info!("Document Q&A chat ready");

    let state = AppState::new(components.agent);
    chat::start_session_sweeper(state.clone(), SESSION_IDLE_TIMEOUT);
    web::serve(chat::router(state), CHAT_ADDR).await?;

    tracing::info!("Server stopped");
    Ok(())
}
