//! Generation service abstraction layer.
//!
//! This module provides a trait-based abstraction over the text/image model
//! used to derive track metadata, allowing the sync controller to work with
//! different backends (OpenAI-compatible APIs, Ollama, test fakes).

mod ollama;
mod openai;
mod provider;
mod types;

pub use ollama::OllamaProvider;
pub use openai::{ApiKeySource, OpenAIProvider};
pub use provider::{
    CompletionOptions, GenerationService, ImageOptions, ResponseSchema, ServiceError,
};
#[cfg(feature = "mock")]
pub use provider::MockGenerationService;
pub use types::{CompletionResponse, FinishReason, GeneratedImage, Message, MessageRole, TokenUsage};
