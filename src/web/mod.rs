//! HTML front ends served with axum.

pub mod chat;
pub mod form;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Html, Json};
use chrono::Utc;
use once_cell::sync::Lazy;
use tera::{Context, Tera};

use crate::agent::PrimaryAgent;
use crate::session::SessionStore;

pub const FORM_ADDR: &str = "0.0.0.0:7860";
pub const CHAT_ADDR: &str = "0.0.0.0:8501";

static TEMPLATES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../../templates/base.html")),
        ("form.html", include_str!("../../templates/form.html")),
        ("chat.html", include_str!("../../templates/chat.html")),
    ])
    .expect("built-in templates must parse");
    tera
});

pub struct AppState {
    pub agent: Arc<PrimaryAgent>,
    pub sessions: SessionStore,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(agent: Arc<PrimaryAgent>) -> SharedState {
        Arc::new(Self {
            agent,
            sessions: SessionStore::new(),
        })
    }
}

fn render(template: &str, context: &Context) -> Result<Html<String>, (StatusCode, String)> {
    TEMPLATES.render(template, context).map(Html).map_err(|e| {
        tracing::error!("Template error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Template error: {}", e))
    })
}

pub async fn health_check(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let model_endpoint = state.agent.model().health_check().await.unwrap_or(false);

    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "services": {
            "model_endpoint": model_endpoint
        }
    }))
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server");
}

/// Bind `addr` and serve `app` until Ctrl-C.
pub async fn serve(app: axum::Router, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
