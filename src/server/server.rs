use anyhow::Result;
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use super::metrics::metrics_handler;
use super::websocket::ws_handler;
use super::{log_requests, state::ServerState, ServerConfig};
use crate::metadata::{cover, MetadataField, GENRES};
use crate::sync::{ErrorKind, IncomingFile, SyncError, SyncHandle};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub provider: String,
    pub model: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    kind: ErrorKind,
    error: String,
}

#[derive(Deserialize, Debug)]
struct LinkBody {
    pub link: String,
}

#[derive(Deserialize, Debug)]
struct FieldEditBody {
    pub field: MetadataField,
    pub value: String,
}

#[derive(Deserialize, Debug)]
struct RegenerateBody {
    #[serde(default)]
    pub image: bool,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn error_status(error: &SyncError) -> StatusCode {
    match error {
        SyncError::InvalidInputKind(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        SyncError::EmptyInput(_) => StatusCode::BAD_REQUEST,
        SyncError::LinkResolution(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SyncError::GenerationService(_) => StatusCode::BAD_GATEWAY,
        SyncError::CycleCrashed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SyncError::ControllerStopped => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(error: SyncError) -> Response {
    (
        error_status(&error),
        Json(ErrorResponse {
            kind: error.kind(),
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(kind: ErrorKind, message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            kind,
            error: message.into(),
        }),
    )
        .into_response()
}

/// Reply with the state right after the operation was applied.
fn respond(sync: &SyncHandle, result: Result<(), SyncError>) -> Response {
    match result {
        Ok(()) => Json(sync.snapshot()).into_response(),
        Err(e) => error_response(e),
    }
}

/// Read the `file` part of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<IncomingFile, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                return Err(bad_request(
                    ErrorKind::InvalidInputKind,
                    format!("Malformed multipart body: {}", e.body_text()),
                ));
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        return match field.bytes().await {
            Ok(bytes) => Ok(IncomingFile::new(file_name, content_type, bytes.to_vec())),
            Err(e) => {
                warn!("Failed to read uploaded file: {}", e);
                Err(bad_request(ErrorKind::InvalidInputKind, "Failed to read file"))
            }
        };
    }
    Err(bad_request(ErrorKind::EmptyInput, "No file provided"))
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        provider: state.provider.clone(),
        model: state.model.clone(),
    })
}

async fn get_state(State(sync): State<SyncHandle>) -> impl IntoResponse {
    Json(sync.snapshot())
}

async fn get_genres() -> impl IntoResponse {
    Json(GENRES)
}

/// POST /api/audio - Select an audio file (multipart/form-data, `file` part)
async fn post_audio(State(sync): State<SyncHandle>, multipart: Multipart) -> Response {
    let file = match read_upload(multipart).await {
        Ok(file) => file,
        Err(response) => return response,
    };
    debug!("Received audio file {} ({} bytes)", file.file_name, file.bytes.len());
    let result = sync.select_audio_file(file).await;
    respond(&sync, result)
}

async fn post_link(State(sync): State<SyncHandle>, Json(body): Json<LinkBody>) -> Response {
    let result = sync.submit_link(body.link).await;
    respond(&sync, result)
}

async fn patch_fields(
    State(sync): State<SyncHandle>,
    Json(body): Json<FieldEditBody>,
) -> Response {
    let result = sync.edit_field(body.field, body.value).await;
    respond(&sync, result)
}

/// POST /api/cover - Upload a user cover image (multipart/form-data, `file` part)
async fn post_cover(State(sync): State<SyncHandle>, multipart: Multipart) -> Response {
    let file = match read_upload(multipart).await {
        Ok(file) => file,
        Err(response) => return response,
    };
    let result = sync.upload_cover(file).await;
    respond(&sync, result)
}

async fn delete_cover(State(sync): State<SyncHandle>) -> Response {
    let result = sync.clear_cover().await;
    respond(&sync, result)
}

/// GET /api/cover/download - The current cover as `<title>-cover.jpg`
async fn download_cover(State(sync): State<SyncHandle>) -> Response {
    let record = sync.snapshot().record;
    let Some(image) = record.cover_image else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some((mime_type, bytes)) = cover::decode_data_uri(&image.data_uri) else {
        warn!("Stored cover is not a valid data URI");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        cover::cover_file_name(&record.title)
    );
    (
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

async fn post_regenerate(
    State(sync): State<SyncHandle>,
    Json(body): Json<RegenerateBody>,
) -> Response {
    let result = sync.regenerate(body.image).await;
    respond(&sync, result)
}

pub fn make_app(config: ServerConfig, state: ServerState) -> Router {
    let upload_routes: Router = Router::new()
        .route("/audio", post(post_audio))
        .route("/cover", post(post_cover).delete(delete_cover))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state.clone());

    let api_routes: Router = Router::new()
        .route("/health", get(home))
        .route("/state", get(get_state))
        .route("/genres", get(get_genres))
        .route("/link", post(post_link))
        .route("/fields", patch(patch_fields))
        .route("/cover/download", get(download_cover))
        .route("/regenerate", post(post_regenerate))
        .route("/ws", get(ws_handler))
        .with_state(state.clone())
        .merge(upload_routes);

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(home)).with_state(state.clone()),
    };

    home_router
        .nest("/api", api_routes)
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    config: ServerConfig,
    sync: SyncHandle,
    provider: String,
    model: String,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let port = config.port;
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        sync,
        provider,
        model,
    };
    let app = make_app(config, state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;
    Ok(())
}
