//! Chat sessions for the chat page.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::agent::PrimaryAgent;
use crate::llm::Role;

pub const EMPTY_ANSWER_MESSAGE: &str =
    "I apologize, but I couldn't generate a proper response. Please try again.";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
            created_at: Utc::now(),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Answered(String),
    /// Shown to the user as an error; the user turn stays in the history.
    Failed(String),
}

/// One chat turn: record the question, ask the agent, record the answer.
pub async fn run_turn(history: &mut ChatHistory, agent: &PrimaryAgent, prompt: &str) -> TurnOutcome {
    history.push(Role::User, prompt);

    match agent.run(prompt).await {
        Ok(answer) if answer.trim().is_empty() => {
            tracing::error!("Failed to generate valid response");
            TurnOutcome::Failed(EMPTY_ANSWER_MESSAGE.to_string())
        }
        Ok(answer) => {
            history.push(Role::Assistant, answer.clone());
            tracing::info!("Successfully generated response");
            TurnOutcome::Answered(answer)
        }
        Err(e) => {
            tracing::error!("Error in chat turn: {}", e);
            TurnOutcome::Failed(format!("An error occurred: {}", e))
        }
    }
}

pub type SessionHandle = Arc<Mutex<ChatHistory>>;

struct SessionEntry {
    history: SessionHandle,
    last_used: Instant,
}

impl SessionEntry {
    fn touch(&mut self) -> SessionHandle {
        self.last_used = Instant::now();
        self.history.clone()
    }
}

/// Chat histories keyed by session id.
///
/// Each history sits behind its own lock, held for a whole turn, so one
/// session never has two requests in flight. Entries record when they were
/// last used and [`evict_idle`](Self::evict_idle) ends the stale ones.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, id: Uuid) -> SessionHandle {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(id)
            .or_insert_with(|| {
                tracing::info!("Initialized new chat history for session {}", id);
                SessionEntry {
                    history: Arc::new(Mutex::new(ChatHistory::new())),
                    last_used: Instant::now(),
                }
            })
            .touch()
    }

    /// Existing session only; never creates one.
    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.lock().await.get_mut(id).map(SessionEntry::touch)
    }

    /// End every session unused for at least `max_idle`. Sessions with a
    /// turn in flight are kept. Returns how many were ended.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = entry.last_used.elapsed() >= max_idle && Arc::strong_count(&entry.history) == 1;
            if idle {
                tracing::info!("Ended idle chat session {}", id);
            }
            !idle
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::rag_call;
    use crate::llm::Message;
    use crate::pipeline::testing::{FixedRetriever, ScriptedModel};
    use crate::pipeline::RagPipeline;

    fn agent(tool_replies: Vec<anyhow::Result<Message>>, reasoner_replies: Vec<anyhow::Result<Message>>) -> PrimaryAgent {
        PrimaryAgent::new(
            Arc::new(ScriptedModel::new("qwen", tool_replies)),
            RagPipeline::new(
                Arc::new(FixedRetriever::new(&["Paris is the capital of France."])),
                Arc::new(ScriptedModel::new("deepseek", reasoner_replies)),
            ),
        )
    }

    #[tokio::test]
    async fn test_successful_turn_adds_two_entries() {
        let agent = agent(
            vec![Ok(rag_call("c1", "capital?")), Ok(Message::assistant("Paris."))],
            vec![Ok(Message::assistant("Paris"))],
        );
        let mut history = ChatHistory::new();

        let outcome = run_turn(&mut history, &agent, "What is the capital of France?").await;

        assert_eq!(outcome, TurnOutcome::Answered("Paris.".to_string()));
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].role, Role::User);
        assert_eq!(history.messages()[0].content, "What is the capital of France?");
        assert_eq!(history.messages()[1].role, Role::Assistant);
        assert_eq!(history.messages()[1].content, "Paris.");
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_only_user_entry() {
        let agent = agent(vec![Err(anyhow::anyhow!("connection refused"))], vec![]);
        let mut history = ChatHistory::new();
        history.push(Role::User, "earlier");
        history.push(Role::Assistant, "earlier answer");

        let outcome = run_turn(&mut history, &agent, "q").await;

        match outcome {
            TurnOutcome::Failed(message) => {
                assert!(message.starts_with("An error occurred: "));
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[2].role, Role::User);
    }

    #[tokio::test]
    async fn test_empty_answer_is_a_failed_turn() {
        let agent = agent(vec![Ok(Message::assistant("  "))], vec![]);
        let mut history = ChatHistory::new();

        let outcome = run_turn(&mut history, &agent, "q").await;

        assert_eq!(outcome, TurnOutcome::Failed(EMPTY_ANSWER_MESSAGE.to_string()));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_clear_empties_history() {
        let mut history = ChatHistory::new();
        for i in 0..7 {
            history.push(Role::User, format!("q{}", i));
        }
        history.clear();
        assert!(history.is_empty());

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_sessions_are_isolated() {
        tokio_test::block_on(async {
            let store = SessionStore::new();
            let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

            store.get_or_create(a).await.lock().await.push(Role::User, "hello");
            let other = store.get_or_create(b).await;

            assert!(other.lock().await.is_empty());
            assert_eq!(store.get(&a).await.unwrap().lock().await.len(), 1);
            assert_eq!(store.len().await, 2);

            assert_eq!(store.evict_idle(Duration::ZERO).await, 1);
            assert!(store.get(&a).await.is_none());
            assert!(store.get(&b).await.is_some());
        });
    }

    #[test]
    fn test_get_or_create_returns_same_history() {
        tokio_test::block_on(async {
            let store = SessionStore::new();
            let id = Uuid::new_v4();

            let first = store.get_or_create(id).await;
            let second = store.get_or_create(id).await;
            assert!(Arc::ptr_eq(&first, &second));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_evicted() {
        let store = SessionStore::new();
        let (idle, active) = (Uuid::new_v4(), Uuid::new_v4());
        store.get_or_create(idle).await;
        store.get_or_create(active).await;

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        store.get(&active).await;
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(store.evict_idle(Duration::from_secs(30 * 60)).await, 1);
        assert!(store.get(&idle).await.is_none());
        assert!(store.get(&active).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_in_use_is_not_evicted() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        let held = store.get_or_create(id).await;

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(store.evict_idle(Duration::from_secs(60)).await, 0);

        drop(held);
        assert_eq!(store.evict_idle(Duration::from_secs(60)).await, 1);
        assert!(store.is_empty().await);
    }
}
