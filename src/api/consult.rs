//! Consultation endpoints
//!
//! `POST /api/consult` takes a multipart form with optional `audio` and
//! `image` files and runs one pipeline pass. Reply audio is fetched
//! afterwards from `GET /api/audio/{name}`.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use super::ApiState;
use crate::pipeline::is_reply_name;

/// Largest accepted consultation upload (photo plus recording)
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build consultation router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/consult", post(consult))
        .route("/audio/{name}", get(reply_audio))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Consultation response
#[derive(Debug, Serialize)]
pub struct ConsultResponse {
    pub transcript: String,
    pub diagnosis: String,
    /// Where to fetch the spoken reply, if one was produced
    pub audio_url: Option<String>,
}

/// Run a consultation on the uploaded files
async fn consult(
    State(state): State<Arc<ApiState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConsultResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    // Removed with everything in it when the request ends
    let uploads = tempfile::tempdir()
        .map_err(|e| ApiError::Internal(format!("failed to create upload directory: {e}")))?;

    let mut audio = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let (slot, default_extension) = match name.as_str() {
            "audio" => (&mut audio, "mp3"),
            "image" => (&mut image, "jpg"),
            other => {
                tracing::debug!(field = other, "ignoring unknown form field");
                continue;
            }
        };

        let extension = upload_extension(field.file_name(), default_extension);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read '{name}' field: {e}")))?;

        // Browsers send an empty part for an untouched file input
        if bytes.is_empty() {
            continue;
        }

        let path = uploads.path().join(format!("{name}.{extension}"));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to store upload: {e}")))?;

        tracing::debug!(field = %name, bytes = bytes.len(), "stored upload");
        *slot = Some(path);
    }

    tracing::info!(
        has_audio = audio.is_some(),
        has_image = image.is_some(),
        "consultation requested"
    );

    let result = state
        .pipeline
        .consult(audio.as_deref(), image.as_deref())
        .await;

    let audio_url = result
        .reply_audio
        .as_deref()
        .and_then(Path::file_name)
        .map(|name| format!("/api/audio/{}", name.to_string_lossy()));

    Ok(Json(ConsultResponse {
        transcript: result.transcript,
        diagnosis: result.diagnosis,
        audio_url,
    }))
}

/// Serve a synthesized reply
async fn reply_audio(
    State(state): State<Arc<ApiState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<Response, ApiError> {
    if !is_reply_name(&name) {
        return Err(ApiError::BadRequest(format!("not a reply file: {name}")));
    }

    let audio = match tokio::fs::read(state.output_dir.join(&name)).await {
        Ok(audio) => audio,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("no such reply: {name}")));
        }
        Err(e) => return Err(ApiError::Internal(format!("failed to read reply: {e}"))),
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "audio/mpeg")],
        audio,
    )
        .into_response())
}

/// Extension to store an upload under, taken from the client's file name
fn upload_extension(file_name: Option<&str>, default: &str) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map_or_else(|| default.to_string(), str::to_ascii_lowercase)
}

/// Consultation API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "consultation request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
