//! Chat page: a per-session transcript with a clear-history control.

use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Redirect},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tera::Context;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::{health_check, render, SharedState};
use crate::session::{run_turn, ChatHistory, TurnOutcome};

pub const SESSION_COOKIE: &str = "doc_qa_session";

/// Sessions unused for this long are ended by the sweeper.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub prompt: String,
}

type PageResult = Result<(CookieJar, Html<String>), (StatusCode, String)>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat))
        .route("/clear", post(clear))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// End idle sessions in the background for the life of the process.
pub fn start_session_sweeper(state: SharedState, max_idle: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SESSION_SWEEP_INTERVAL).await;
            let ended = state.sessions.evict_idle(max_idle).await;
            if ended > 0 {
                tracing::info!("Ended {} idle chat sessions", ended);
            }
        }
    });
}

/// Session id from the cookie, issuing a new one when absent or unparsable.
fn session_id(jar: CookieJar) -> (CookieJar, Uuid) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    {
        return (jar, id);
    }

    let id = Uuid::new_v4();
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), id)
}

fn render_page(history: &ChatHistory, error: Option<&str>) -> Result<Html<String>, (StatusCode, String)> {
    let mut context = Context::new();
    context.insert("messages", history.messages());
    context.insert("error", &error);
    render("chat.html", &context)
}

/// The session's transcript, or an empty page when it has none yet.
async fn render_session(state: &SharedState, id: &Uuid) -> Result<Html<String>, (StatusCode, String)> {
    let Some(session) = state.sessions.get(id).await else {
        return render_page(&ChatHistory::new(), None);
    };
    let history = session.lock().await;
    render_page(&history, None)
}

async fn index(State(state): State<SharedState>, jar: CookieJar) -> PageResult {
    let (jar, id) = session_id(jar);
    Ok((jar, render_session(&state, &id).await?))
}

async fn chat(
    State(state): State<SharedState>,
    jar: CookieJar,
    Form(form): Form<ChatForm>,
) -> PageResult {
    let (jar, id) = session_id(jar);
    if form.prompt.is_empty() {
        return Ok((jar, render_session(&state, &id).await?));
    }

    let session = state.sessions.get_or_create(id).await;
    // Held for the whole turn: one request in flight per session.
    let mut history = session.lock().await;

    let page = match run_turn(&mut history, &state.agent, &form.prompt).await {
        TurnOutcome::Answered(_) => render_page(&history, None)?,
        TurnOutcome::Failed(message) => render_page(&history, Some(&message))?,
    };
    Ok((jar, page))
}

async fn clear(State(state): State<SharedState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let (jar, id) = session_id(jar);
    if let Some(session) = state.sessions.get(&id).await {
        session.lock().await.clear();
        tracing::info!("Chat history cleared for session {}", id);
    }
    (jar, Redirect::to("/"))
}
