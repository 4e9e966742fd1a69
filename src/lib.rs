pub mod agent;
pub mod config;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod runtime;
pub mod session;
pub mod setup;
pub mod telemetry;
pub mod web;
