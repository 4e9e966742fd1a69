//! Single-shot question form: one query in, one answer out, no session.

use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tera::Context;
use tower_http::trace::TraceLayer;

use super::{health_check, render, SharedState};
use crate::error::QaError;

#[derive(Debug, Deserialize)]
pub struct AskForm {
    pub query: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ask", post(ask))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Result<Html<String>, (StatusCode, String)> {
    let mut context = Context::new();
    context.insert("query", "");
    render("form.html", &context)
}

async fn ask(
    State(state): State<SharedState>,
    Form(form): Form<AskForm>,
) -> Result<Html<String>, (StatusCode, String)> {
    let answer = state.agent.run(&form.query).await.map_err(|e| {
        tracing::error!("Agent error: {}", e);
        (status_for(&e), e.to_string())
    })?;

    let mut context = Context::new();
    context.insert("query", &form.query);
    context.insert("answer", &answer);
    render("form.html", &context)
}

fn status_for(error: &QaError) -> StatusCode {
    match error {
        QaError::Model { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
