pub mod client;
pub mod models;

pub use client::{local_model, ChatModel, CompletionModel, CompletionOptions};
pub use models::{Message, Role, ToolCall, ToolDefinition};
