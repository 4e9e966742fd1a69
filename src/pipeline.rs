//! Retrieval-augmented answering: retrieve, assemble, generate.
//!
//! The pipeline searches the store for the three chunks nearest to the
//! question, joins them into one context block, fills the fixed prompt
//! template and returns whatever the reasoning model writes, untouched.
//! Failures at any step are returned to the caller as they are.

use std::sync::Arc;

use crate::error::{QaError, Result};
use crate::llm::{CompletionModel, CompletionOptions, Message};
use crate::rag::Retriever;

pub const TOP_K: usize = 3;
pub const MAX_ANSWER_TOKENS: u32 = 1000;
pub const CONTEXT_SEPARATOR: &str = "\n\n";
pub const REASONER_SYSTEM_PROMPT: &str = "Based on the provided context, answer concisely.";

/// Chunk texts for one query, in similarity order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedContext {
    chunks: Vec<String>,
}

impl RetrievedContext {
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks separated by a blank line; empty string when nothing matched.
    pub fn joined(&self) -> String {
        self.chunks.join(CONTEXT_SEPARATOR)
    }
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following context, answer the user's question. Be concise and specific.
If there isn't sufficient information, provide a better query for RAG.

Context:
{context}

Question: {question}

Answer:"
    )
}

pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    reasoner: Arc<dyn CompletionModel>,
}

impl RagPipeline {
    pub fn new(retriever: Arc<dyn Retriever>, reasoner: Arc<dyn CompletionModel>) -> Self {
        Self { retriever, reasoner }
    }

    /// The top-[`TOP_K`] chunks for `query`. The query is used verbatim.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext> {
        let mut chunks = self
            .retriever
            .similarity_search(query, TOP_K)
            .await
            .map_err(QaError::Retrieval)?;
        chunks.truncate(TOP_K);
        Ok(RetrievedContext::new(chunks))
    }

    pub async fn answer(&self, query: &str) -> Result<String> {
        let context = self.retrieve(query).await?;
        if context.is_empty() {
            tracing::info!("No matching chunks for query; asking the reasoner anyway");
        } else {
            tracing::debug!("Retrieved {} chunks for query", context.chunks().len());
        }

        let prompt = build_prompt(&context.joined(), query);
        self.generate(prompt).await
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let messages = vec![Message::system(REASONER_SYSTEM_PROMPT), Message::user(prompt)];
        let options = CompletionOptions {
            max_tokens: Some(MAX_ANSWER_TOKENS),
            tools: Vec::new(),
        };

        let reply = self
            .reasoner
            .complete(messages, options)
            .await
            .map_err(|e| QaError::model(self.reasoner.model_id(), e))?;

        Ok(reply.content.unwrap_or_default())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FixedRetriever, ScriptedModel};
    use super::*;
    use crate::llm::Role;

    const FRANCE: [&str; 3] = [
        "Paris is the capital of France.",
        "The Eiffel Tower is in Paris.",
        "France is in Europe.",
    ];

    fn pipeline(retriever: FixedRetriever, reasoner: Arc<ScriptedModel>) -> RagPipeline {
        RagPipeline::new(Arc::new(retriever), reasoner)
    }

    #[test]
    fn test_prompt_template_exact() {
        let prompt = build_prompt("ctx", "why?");
        assert_eq!(
            prompt,
            "Based on the following context, answer the user's question. Be concise and specific.\n\
             If there isn't sufficient information, provide a better query for RAG.\n\
             \n\
             Context:\n\
             ctx\n\
             \n\
             Question: why?\n\
             \n\
             Answer:"
        );
    }

    #[test]
    fn test_context_joins_with_blank_lines() {
        let context = RetrievedContext::new(FRANCE.iter().map(|s| s.to_string()).collect());
        assert_eq!(
            context.joined(),
            "Paris is the capital of France.\n\nThe Eiffel Tower is in Paris.\n\nFrance is in Europe."
        );
        assert_eq!(RetrievedContext::new(Vec::new()).joined(), "");
    }

    #[tokio::test]
    async fn test_answer_sends_context_and_question_verbatim() {
        let reasoner = Arc::new(ScriptedModel::new(
            "deepseek-r1:7b",
            vec![Ok(Message::assistant("Paris."))],
        ));
        let pipeline = pipeline(FixedRetriever::new(&FRANCE), reasoner.clone());

        let answer = pipeline.answer("What is the capital of France?").await.unwrap();
        assert_eq!(answer, "Paris.");

        let requests = reasoner.requests.lock().unwrap();
        let (messages, options) = &requests[0];
        assert_eq!(options.max_tokens, Some(1000));
        assert!(options.tools.is_empty());
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content.as_deref(), Some(REASONER_SYSTEM_PROMPT));
        assert_eq!(
            messages[1].content.as_deref(),
            Some(build_prompt(&FRANCE.join("\n\n"), "What is the capital of France?").as_str())
        );
    }

    #[tokio::test]
    async fn test_retrieve_uses_k_three() {
        let retriever = FixedRetriever::new(&["a", "b", "c", "d", "e"]);
        let reasoner = Arc::new(ScriptedModel::new("r", vec![]));
        let pipeline = RagPipeline::new(Arc::new(retriever), reasoner);

        let context = pipeline.retrieve("q").await.unwrap();
        assert_eq!(context.chunks(), &["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_store_still_invokes_model() {
        let reasoner = Arc::new(ScriptedModel::new(
            "r",
            vec![Ok(Message::assistant("Try asking about a specific document."))],
        ));
        let pipeline = pipeline(FixedRetriever::new(&[]), reasoner.clone());

        let answer = pipeline.answer("anything").await.unwrap();
        assert_eq!(answer, "Try asking about a specific document.");
        assert_eq!(reasoner.request_count(), 1);

        let requests = reasoner.requests.lock().unwrap();
        let prompt = requests[0].0[1].content.clone().unwrap();
        assert!(prompt.contains("Context:\n\n\nQuestion: anything"));
    }

    #[tokio::test]
    async fn test_whitespace_query_passed_through() {
        let retriever = Arc::new(FixedRetriever::new(&["x"]));
        let reasoner = Arc::new(ScriptedModel::new("r", vec![Ok(Message::assistant("?"))]));
        let pipeline = RagPipeline::new(retriever.clone(), reasoner);

        pipeline.answer("   ").await.unwrap();
        assert_eq!(retriever.queries.lock().unwrap()[0], ("   ".to_string(), 3));
    }

    #[tokio::test]
    async fn test_same_query_same_context() {
        let reasoner = Arc::new(ScriptedModel::new("r", vec![]));
        let pipeline = pipeline(FixedRetriever::new(&FRANCE), reasoner);

        let first = pipeline.retrieve("capital").await.unwrap();
        let second = pipeline.retrieve("capital").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let reasoner = Arc::new(ScriptedModel::new("r", vec![]));
        let pipeline = pipeline(FixedRetriever::failing(), reasoner.clone());

        let err = pipeline.answer("q").await.unwrap_err();
        assert!(matches!(err, QaError::Retrieval(_)));
        assert_eq!(reasoner.request_count(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let reasoner = Arc::new(ScriptedModel::new(
            "deepseek-r1:7b",
            vec![Err(anyhow::anyhow!("connection refused"))],
        ));
        let pipeline = pipeline(FixedRetriever::new(&FRANCE), reasoner);

        let err = pipeline.answer("q").await.unwrap_err();
        match err {
            QaError::Model { model, .. } => assert_eq!(model, "deepseek-r1:7b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_answer_returned_verbatim() {
        let raw = "  <think>hmm</think>\n**Paris**  \n";
        let reasoner = Arc::new(ScriptedModel::new("r", vec![Ok(Message::assistant(raw))]));
        let pipeline = pipeline(FixedRetriever::new(&FRANCE), reasoner);

        assert_eq!(pipeline.answer("q").await.unwrap(), raw);
    }
}
