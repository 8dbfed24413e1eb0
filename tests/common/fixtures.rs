//! Fake generation backend used by the test server

use super::constants::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use track_metadata_sync::generation::{
    CompletionOptions, CompletionResponse, FinishReason, GeneratedImage, GenerationService,
    ImageOptions, Message, ResponseSchema, ServiceError,
};

/// Answers every completion with fixed metadata and every image request
/// with a PNG, recording what it was asked.
#[derive(Default)]
pub struct FakeGenerationService {
    text_calls: AtomicUsize,
    image_calls: AtomicUsize,
    titles: Mutex<Vec<String>>,
}

impl FakeGenerationService {
    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    /// Titles seen in completion prompts, in call order
    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for FakeGenerationService {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _schema: Option<ResponseSchema>,
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, ServiceError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let title = messages
            .iter()
            .flat_map(|m| m.content.lines())
            .find_map(|line| line.strip_prefix("Title: "))
            .unwrap_or_default()
            .to_string();
        self.titles.lock().unwrap().push(title.clone());

        let content = serde_json::json!({
            "genre": GENERATED_GENRE,
            "tags": GENERATED_TAGS,
            "description": format!("A generated description of {}.", title),
        })
        .to_string();

        Ok(CompletionResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }

    async fn generate_image(
        &self,
        _prompt: &str,
        _options: &ImageOptions,
    ) -> Result<GeneratedImage, ServiceError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedImage {
            bytes: PNG_BYTES.to_vec(),
            mime_type: Some("image/png".to_string()),
        })
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
