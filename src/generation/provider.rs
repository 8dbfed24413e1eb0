//! Generation service trait definition.

use super::types::{CompletionResponse, GeneratedImage, Message};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Options for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Structured-output contract passed along with a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Identifier of the schema, sent to providers that require one.
    pub name: String,
    /// JSON schema the response object must satisfy.
    pub schema: serde_json::Value,
}

/// Options for an image generation request.
#[derive(Debug, Clone)]
pub struct ImageOptions {
    /// Requested image size, e.g. "1024x1024".
    pub size: String,
    /// Number of images to generate.
    pub count: u8,
    /// Request timeout.
    pub timeout: Duration,
}

impl ImageOptions {
    /// A single square image, the only shape the sync pipeline asks for.
    pub fn square(timeout: Duration) -> Self {
        Self {
            size: "1024x1024".to_string(),
            count: 1,
            timeout,
        }
    }
}

/// Errors that can occur when interacting with a generation service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,

    #[error("{0} does not support {1}")]
    Unsupported(String, &'static str),
}

/// Trait for generation service backends.
///
/// Implementations connect to different model providers while exposing the
/// two calls the sync pipeline makes: a structured text completion and a
/// single image generation.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Get the provider's name (e.g., "ollama", "openai").
    fn name(&self) -> &str;

    /// Get the text model being used.
    fn model(&self) -> &str;

    /// Complete a prompt, optionally constraining the output to a JSON schema.
    async fn complete(
        &self,
        messages: &[Message],
        schema: Option<ResponseSchema>,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ServiceError>;

    /// Generate images for a prompt. Returns the encoded bytes of the first image.
    async fn generate_image(
        &self,
        prompt: &str,
        options: &ImageOptions,
    ) -> Result<GeneratedImage, ServiceError>;

    /// Check if the provider is healthy and reachable.
    async fn health_check(&self) -> Result<(), ServiceError>;
}

/// Map a reqwest failure to a service error, keeping timeouts distinct.
pub(super) fn map_request_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else {
        ServiceError::Connection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_image_options() {
        let options = ImageOptions::square(Duration::from_secs(30));
        assert_eq!(options.size, "1024x1024");
        assert_eq!(options.count, 1);
    }

    #[test]
    fn test_error_display() {
        let err = ServiceError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error (status 500): boom");
        assert_eq!(
            ServiceError::Unsupported("ollama".to_string(), "image generation").to_string(),
            "ollama does not support image generation"
        );
    }
}
