//! Outer tool-calling agent.
//!
//! The tool model sees the user's question together with one tool,
//! `rag_with_reasoner`. Each round it either answers in text or asks for the
//! tool; tool requests are run through the [`RagPipeline`] and the results are
//! fed back until the model answers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::error::{QaError, Result};
use crate::llm::{CompletionModel, CompletionOptions, Message, ToolCall, ToolDefinition};
use crate::pipeline::RagPipeline;

pub const RAG_TOOL_NAME: &str = "rag_with_reasoner";
pub const MAX_MODEL_ROUNDS: usize = 8;

const RAG_TOOL_DESCRIPTION: &str = "Answer a question about the user's documents. Searches the \
vector store for passages relevant to the query, then has a reasoning model write a concise \
answer grounded in those passages.";

/// What the tool model decided in one round.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    FinalAnswer(String),
    InvokeTools(Vec<ToolRequest>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub call_id: String,
    pub action: ToolAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolAction {
    RagPipeline { user_query: String },
    /// A call that cannot be executed; the message is sent back to the model.
    Rejected { reason: String },
}

#[derive(Deserialize)]
struct RagToolArgs {
    user_query: String,
}

pub fn rag_tool_definition() -> ToolDefinition {
    ToolDefinition::function(
        RAG_TOOL_NAME,
        RAG_TOOL_DESCRIPTION,
        json!({
            "type": "object",
            "properties": {
                "user_query": {
                    "type": "string",
                    "description": "The question to answer from the documents."
                }
            },
            "required": ["user_query"]
        }),
    )
}

/// Classify the assistant message of one round.
pub fn interpret(reply: &Message) -> AgentStep {
    let calls = reply.requested_tools();
    if calls.is_empty() {
        return AgentStep::FinalAnswer(reply.content.clone().unwrap_or_default());
    }

    AgentStep::InvokeTools(calls.iter().map(tool_request).collect())
}

fn tool_request(call: &ToolCall) -> ToolRequest {
    let action = if call.function.name != RAG_TOOL_NAME {
        ToolAction::Rejected {
            reason: format!(
                "Unknown tool name: '{}'. Available tools: {}",
                call.function.name, RAG_TOOL_NAME
            ),
        }
    } else {
        match serde_json::from_str::<RagToolArgs>(&call.function.arguments) {
            Ok(args) => ToolAction::RagPipeline {
                user_query: args.user_query,
            },
            Err(e) => ToolAction::Rejected {
                reason: format!(
                    "Invalid arguments for {}: {}. Expected {{\"user_query\": string}}",
                    RAG_TOOL_NAME, e
                ),
            },
        }
    };

    ToolRequest {
        call_id: call.id.clone(),
        action,
    }
}

pub struct PrimaryAgent {
    model: Arc<dyn CompletionModel>,
    pipeline: RagPipeline,
}

impl PrimaryAgent {
    pub fn new(model: Arc<dyn CompletionModel>, pipeline: RagPipeline) -> Self {
        Self { model, pipeline }
    }

    pub fn model(&self) -> &Arc<dyn CompletionModel> {
        &self.model
    }

    /// Drive the tool model until it answers.
    pub async fn run(&self, query: &str) -> Result<String> {
        let mut messages = vec![Message::user(query)];
        let tools = vec![rag_tool_definition()];

        for round in 1..=MAX_MODEL_ROUNDS {
            let reply = self
                .model
                .complete(
                    messages.clone(),
                    CompletionOptions {
                        max_tokens: None,
                        tools: tools.clone(),
                    },
                )
                .await
                .map_err(|e| QaError::model(self.model.model_id(), e))?;

            match interpret(&reply) {
                AgentStep::FinalAnswer(answer) => {
                    tracing::debug!("Tool model answered after {} round(s)", round);
                    return Ok(answer);
                }
                AgentStep::InvokeTools(requests) => {
                    messages.push(reply);
                    for request in requests {
                        let content = self.execute(&request).await?;
                        messages.push(Message::tool_result(request.call_id, content));
                    }
                }
            }
        }

        Err(QaError::ToolLoop(MAX_MODEL_ROUNDS))
    }

    async fn execute(&self, request: &ToolRequest) -> Result<String> {
        match &request.action {
            ToolAction::RagPipeline { user_query } => {
                tracing::info!("Tool model invoked {} (call {})", RAG_TOOL_NAME, request.call_id);
                self.pipeline.answer(user_query).await
            }
            ToolAction::Rejected { reason } => {
                tracing::warn!("Rejected tool call {}: {}", request.call_id, reason);
                Ok(reason.clone())
            }
        }
    }
}
