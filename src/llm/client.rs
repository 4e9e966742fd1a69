use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::models::{ChatRequest, ChatResponse, Message, ToolDefinition};
use crate::config::{LOCAL_MODEL_API_KEY, LOCAL_MODEL_BASE_URL};

/// Per-call options for a completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDefinition>,
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Send the conversation and return the assistant message of the first choice.
    async fn complete(&self, messages: Vec<Message>, options: CompletionOptions) -> Result<Message>;

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Handle to a chat model behind an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model_id: String,
}

/// Model factory: a handle to `model_id` on the local model server.
///
/// Nothing is contacted here; an unknown model only fails when invoked.
pub fn local_model(model_id: &str) -> ChatModel {
    ChatModel::new(
        LOCAL_MODEL_BASE_URL.to_string(),
        Some(LOCAL_MODEL_API_KEY.to_string()),
        model_id.to_string(),
    )
}

impl ChatModel {
    pub fn new(base_url: String, api_key: Option<String>, model_id: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model_id,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            anyhow::bail!("Chat completion failed: {} - {}", status, error_text);
        }

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response)
    }

    fn build_request(&self, messages: Vec<Message>, options: CompletionOptions) -> ChatRequest {
        let has_tools = !options.tools.is_empty();
        ChatRequest {
            model: self.model_id.clone(),
            messages,
            temperature: None,
            max_tokens: options.max_tokens,
            tools: has_tools.then_some(options.tools),
            tool_choice: has_tools.then(|| "auto".to_string()),
            stream: Some(false),
        }
    }
}

#[async_trait]
impl CompletionModel for ChatModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, messages: Vec<Message>, options: CompletionOptions) -> Result<Message> {
        let request = self.build_request(messages, options);
        tracing::debug!(
            "Sending {} messages to {} (tools: {})",
            request.messages.len(),
            self.model_id,
            request.tools.as_ref().map_or(0, Vec::len)
        );

        let response = self.chat_completion(request).await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                "Token usage for {}: prompt={}, completion={}, total={}",
                self.model_id,
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow!("No choices in response from {}", self.model_id))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);

        let mut req = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        Ok(response.status().is_success())
    }
}
