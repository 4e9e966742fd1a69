use anyhow::Result;

use doc_qa::config::AppConfig;
use doc_qa::setup::Components;
use doc_qa::telemetry::init_tracing;
use doc_qa::web::{self, AppState, FORM_ADDR};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    let config = AppConfig::from_env()?;
    let components = Components::from_config(&config).await?;
    tracing::info!("Document Q&A form ready");

    let state = AppState::new(components.agent);
    web::serve(web::form::router(state), FORM_ADDR).await?;

    Ok(())
}
