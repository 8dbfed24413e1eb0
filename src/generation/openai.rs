//! OpenAI-compatible generation provider implementation.
//!
//! Works with OpenAI, OpenRouter, Together AI, vLLM, and any other
//! service implementing the OpenAI chat completions and images APIs.

use super::provider::{
    map_request_error, CompletionOptions, GenerationService, ImageOptions, ResponseSchema,
    ServiceError,
};
use super::types::{CompletionResponse, FinishReason, GeneratedImage, Message, TokenUsage};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Timeout for api_key_command execution.
const API_KEY_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of API key for authentication.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiKeySource {
    /// No authentication.
    None,
    /// Static API key.
    Static(String),
    /// Shell command that outputs the API key (for rotating tokens).
    Command(String),
}

impl ApiKeySource {
    /// Get the current API key, executing the command if necessary.
    async fn get_key(&self) -> Result<Option<String>, ServiceError> {
        match self {
            ApiKeySource::None => Ok(None),
            ApiKeySource::Static(key) => Ok(Some(key.clone())),
            ApiKeySource::Command(cmd) => {
                debug!(command = %cmd, "Fetching API key via command");

                let result = tokio::time::timeout(
                    API_KEY_COMMAND_TIMEOUT,
                    Command::new("sh").arg("-c").arg(cmd).output(),
                )
                .await;

                let output = match result {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        warn!(command = %cmd, error = %e, "api_key_command failed to execute");
                        return Err(ServiceError::Connection(format!(
                            "Failed to execute api_key_command: {}",
                            e
                        )));
                    }
                    Err(_) => {
                        warn!(command = %cmd, "api_key_command timed out");
                        return Err(ServiceError::Timeout);
                    }
                };

                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(command = %cmd, stderr = %stderr, "api_key_command failed");
                    return Err(ServiceError::Connection(format!(
                        "api_key_command failed with status {}: {}",
                        output.status, stderr
                    )));
                }

                let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if key.is_empty() {
                    return Err(ServiceError::Connection(
                        "api_key_command returned empty key".to_string(),
                    ));
                }

                Ok(Some(key))
            }
        }
    }
}

/// OpenAI-compatible generation provider.
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    model: String,
    image_model: String,
    api_key_source: ApiKeySource,
}

impl OpenAIProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the API (e.g., "https://api.openai.com/v1").
    /// * `model` - Text model to use (e.g., "gpt-4o-mini").
    /// * `image_model` - Image model to use (e.g., "dall-e-3").
    /// * `api_key_source` - How to obtain the bearer token.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        image_model: impl Into<String>,
        api_key_source: ApiKeySource,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            image_model: image_model.into(),
            api_key_source,
        }
    }

    async fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ServiceError> {
        Ok(match self.api_key_source.get_key().await? {
            Some(api_key) => builder.header("Authorization", format!("Bearer {}", api_key)),
            None => builder,
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ServiceError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerationService for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        schema: Option<ResponseSchema>,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = OpenAIChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(OpenAIMessage::from).collect(),
            response_format: schema.map(OpenAIResponseFormat::from),
            temperature: Some(options.temperature),
            max_tokens: options.max_tokens,
        };

        debug!(
            model = %self.model,
            message_count = messages.len(),
            structured = request.response_format.is_some(),
            "Sending completion request to OpenAI-compatible API"
        );

        let req_builder = self
            .authorized(self.client.post(&url).json(&request))
            .await?;

        let response = req_builder
            .timeout(options.timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = Self::check_status(response).await?;

        let openai_response: OpenAIChatResponse = response.json().await.map_err(|e| {
            ServiceError::InvalidResponse(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let choice = openai_response.choices.into_iter().next().ok_or_else(|| {
            ServiceError::InvalidResponse("No choices in OpenAI response".to_string())
        })?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::MaxTokens,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        let usage = openai_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        debug!(finish_reason = ?finish_reason, "Received completion response");

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason,
            usage,
        })
    }

    async fn generate_image(
        &self,
        prompt: &str,
        options: &ImageOptions,
    ) -> Result<GeneratedImage, ServiceError> {
        let url = format!("{}/images/generations", self.base_url);

        let request = OpenAIImageRequest {
            model: self.image_model.clone(),
            prompt: prompt.to_string(),
            n: options.count,
            size: options.size.clone(),
            response_format: "b64_json".to_string(),
        };

        debug!(model = %self.image_model, size = %options.size, "Sending image generation request");

        let req_builder = self
            .authorized(self.client.post(&url).json(&request))
            .await?;

        let response = req_builder
            .timeout(options.timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = Self::check_status(response).await?;

        let image_response: OpenAIImageResponse = response.json().await.map_err(|e| {
            ServiceError::InvalidResponse(format!("Failed to parse image response: {}", e))
        })?;

        let encoded = image_response
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or_else(|| {
                ServiceError::InvalidResponse("No image payload in response".to_string())
            })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ServiceError::InvalidResponse(format!("Invalid image payload: {}", e)))?;

        Ok(GeneratedImage {
            bytes,
            mime_type: None,
        })
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        let url = format!("{}/models", self.base_url);

        let req_builder = self
            .authorized(self.client.get(&url).timeout(Duration::from_secs(5)))
            .await?;

        let response = req_builder.send().await.map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(ServiceError::Api {
                status: response.status().as_u16(),
                message: "Health check failed".to_string(),
            });
        }

        Ok(())
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

impl From<&Message> for OpenAIMessage {
    fn from(msg: &Message) -> Self {
        OpenAIMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: OpenAIJsonSchema,
}

#[derive(Debug, Serialize)]
struct OpenAIJsonSchema {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

impl From<ResponseSchema> for OpenAIResponseFormat {
    fn from(schema: ResponseSchema) -> Self {
        OpenAIResponseFormat {
            format_type: "json_schema".to_string(),
            json_schema: OpenAIJsonSchema {
                name: schema.name,
                schema: schema.schema,
                strict: true,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAIImageRequest {
    model: String,
    prompt: String,
    n: u8,
    size: String,
    response_format: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIImageResponse {
    data: Vec<OpenAIImageData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIImageData {
    #[serde(default)]
    b64_json: Option<String>,
}
