//! Two-phase generation pipeline: structured text metadata, then an optional
//! cover image.
//!
//! The pipeline never touches the metadata record. It reports analysis
//! progress through a [`ProgressReporter`] and returns a result for the
//! controller to apply.

use super::error::SyncError;
use crate::generation::{
    CompletionOptions, FinishReason, GenerationService, ImageOptions, Message, ResponseSchema,
};
use crate::metadata::{
    checkpoints, cover, genre_schema, Genre, GenerationRequest, GenerationResult, GENRES,
};
use crate::server::metrics;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_TAGS: &str = "music, audio";
pub const DEFAULT_DESCRIPTION: &str = "A captivating audio track.";

lazy_static! {
    static ref GENRE_FIELD: Regex = field_pattern("genre");
    static ref TAGS_FIELD: Regex = field_pattern("tags");
    static ref DESCRIPTION_FIELD: Regex = field_pattern("description");
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid code fence pattern");
}

fn field_pattern(name: &str) -> Regex {
    Regex::new(&format!(r#"(?i)"?{}"?\s*:\s*"((?:[^"\\]|\\.)*)""#, name))
        .expect("valid field pattern")
}

/// Receives analysis progress checkpoints while a cycle runs.
pub trait ProgressReporter: Send + Sync {
    fn analysis_progress(&self, value: u8);
}

/// What the controller should do with the record after a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The title was empty: clear genre/tags/description/artist, keep the cover.
    ClearRequested,
    Generated(GenerationResult),
}

#[derive(Debug, Deserialize)]
struct TextMetadata {
    genre: String,
    tags: String,
    description: String,
}

/// Text fields recovered from a response, with whether the strict parse held.
#[derive(Debug, Default, PartialEq)]
struct ParsedText {
    genre: Option<String>,
    tags: Option<String>,
    description: Option<String>,
    structured: bool,
}

pub struct GenerationPipeline {
    service: Arc<dyn GenerationService>,
    completion_options: CompletionOptions,
    image_timeout: Duration,
}

impl GenerationPipeline {
    pub fn new(
        service: Arc<dyn GenerationService>,
        completion_options: CompletionOptions,
        image_timeout: Duration,
    ) -> Self {
        Self {
            service,
            completion_options,
            image_timeout,
        }
    }

    pub fn service(&self) -> &Arc<dyn GenerationService> {
        &self.service
    }

    /// Run one generation cycle. Any error resets analysis progress to 0.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutcome, SyncError> {
        let started = Instant::now();
        let result = self.run(request, progress).await;
        let outcome = match &result {
            Ok(PipelineOutcome::ClearRequested) => "cleared",
            Ok(PipelineOutcome::Generated(r)) if r.partial_parse.is_some() => "partial",
            Ok(PipelineOutcome::Generated(_)) => "success",
            Err(_) => "error",
        };
        metrics::record_generation_cycle(outcome, started.elapsed());

        if let Err(e) = &result {
            warn!("Generation cycle for '{}' failed: {}", request.title, e);
            progress.analysis_progress(checkpoints::START);
        }
        result
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutcome, SyncError> {
        if request.title.trim().is_empty() {
            debug!("Empty title, skipping generation service");
            return Ok(PipelineOutcome::ClearRequested);
        }

        progress.analysis_progress(checkpoints::REQUEST_SENT);
        info!(
            title = %request.title,
            track_type = %request.track_type,
            generate_image = request.generate_image,
            provider = self.service.name(),
            "Requesting track metadata"
        );

        let response = self
            .service
            .complete(
                &build_text_prompt(request),
                Some(metadata_schema()),
                &self.completion_options,
            )
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Metadata completion usage"
            );
        }

        let parsed = parse_text_response(&response.content);
        let partial_parse = if !parsed.structured {
            metrics::record_parse_fallback();
            warn!(
                title = %request.title,
                "Metadata response was not valid JSON, using fallback extraction"
            );
            Some(
                "The generated metadata could not be fully parsed; fallback values were applied."
                    .to_string(),
            )
        } else if response.finish_reason == FinishReason::MaxTokens {
            warn!(title = %request.title, "Metadata response hit the token limit");
            Some("The generated metadata was cut short by the token limit.".to_string())
        } else {
            None
        };

        let genre = resolve_genre(parsed.genre.as_deref(), request.genre);
        let tags = parsed
            .tags
            .filter(|t| !t.trim().is_empty())
            .or_else(|| non_empty(&request.tags))
            .unwrap_or_else(|| DEFAULT_TAGS.to_string());
        let description = parsed
            .description
            .filter(|d| !d.trim().is_empty())
            .or_else(|| non_empty(&request.description))
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        progress.analysis_progress(checkpoints::TEXT_APPLIED);

        let image = if request.generate_image {
            progress.analysis_progress(checkpoints::IMAGE_REQUESTED);
            let generated = self
                .service
                .generate_image(
                    &build_image_prompt(request),
                    &ImageOptions::square(self.image_timeout),
                )
                .await?;
            debug!(bytes = generated.bytes.len(), "Received cover image");
            Some(cover::encode_data_uri(
                &generated.bytes,
                generated.mime_type.as_deref(),
            ))
        } else {
            None
        };

        progress.analysis_progress(checkpoints::COMPLETE);

        Ok(PipelineOutcome::Generated(GenerationResult {
            genre,
            tags,
            description,
            image,
            partial_parse,
        }))
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

/// Validate a returned genre, falling back to the caller's current one.
fn resolve_genre(returned: Option<&str>, current: Option<Genre>) -> Option<Genre> {
    match returned.and_then(Genre::parse) {
        Some(genre) => Some(genre),
        None => {
            if let Some(raw) = returned.filter(|r| !r.trim().is_empty()) {
                debug!(genre = raw, "Rejecting genre outside the vocabulary");
            }
            current
        }
    }
}

fn metadata_schema() -> ResponseSchema {
    ResponseSchema {
        name: "track_metadata".to_string(),
        schema: serde_json::json!({
            "type": "object",
            "properties": {
                "genre": genre_schema(),
                "tags": {
                    "type": "string",
                    "description": "Comma-separated tags describing the track"
                },
                "description": {
                    "type": "string",
                    "description": "Short engaging description for the track page"
                }
            },
            "required": ["genre", "tags", "description"],
            "additionalProperties": false
        }),
    }
}

fn build_text_prompt(request: &GenerationRequest) -> Vec<Message> {
    let system = format!(
        "You write publish-ready metadata for audio uploads. \
         Reply with a JSON object containing \"genre\", \"tags\" and \"description\". \
         The genre must be exactly one of: {}.",
        GENRES.join(", ")
    );

    let mut user = format!("Title: {}\n", request.title);
    if let Some(artist) = &request.artist {
        user.push_str(&format!("Artist: {}\n", artist));
    }
    user.push_str(&format!("Type: {}\n", request.track_type));
    if let Some(genre) = request.genre {
        user.push_str(&format!("Current genre: {}\n", genre));
    }
    if !request.tags.trim().is_empty() {
        user.push_str(&format!("Current tags: {}\n", request.tags));
    }
    if !request.description.trim().is_empty() {
        user.push_str(&format!("Current description: {}\n", request.description));
    }
    user.push_str("Refine the current values where they fit; replace them where they don't.");

    vec![Message::system(system), Message::user(user)]
}

fn build_image_prompt(request: &GenerationRequest) -> String {
    format!(
        "Square cover artwork for a {} titled \"{}\". Bold, modern, no text or lettering.",
        request.track_type, request.title
    )
}

/// Parse the model output, falling back to per-field extraction.
fn parse_text_response(content: &str) -> ParsedText {
    let body = CODE_FENCE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(content)
        .trim();

    if let Ok(parsed) = serde_json::from_str::<TextMetadata>(body) {
        return ParsedText {
            genre: Some(parsed.genre),
            tags: Some(parsed.tags),
            description: Some(parsed.description),
            structured: true,
        };
    }

    let extract = |pattern: &Regex| {
        pattern
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| unescape(m.as_str()))
    };

    ParsedText {
        genre: extract(&GENRE_FIELD),
        tags: extract(&TAGS_FIELD),
        description: extract(&DESCRIPTION_FIELD),
        structured: false,
    }
}

fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}
