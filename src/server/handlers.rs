//! Request handlers. Each one validates its input, delegates to
//! [`SlideService`](crate::service::SlideService) and serialises the result;
//! errors render themselves through `RelayError`'s `IntoResponse`.

use super::AppState;
use crate::ai::quiz::{Quiz, QuizRequest};
use crate::error::RelayError;
use crate::output::{HealthResponse, LocateResponse, ScreenshotResponse, UploadResponse};
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::collections::HashMap;
use tracing::{debug, info};

/// A file field pulled out of a multipart body.
#[derive(Debug)]
pub(crate) struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The multipart fields this service cares about.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub file: Option<UploadedFile>,
    pub text: HashMap<String, String>,
}

/// Read a multipart body, buffering the `file` field up to `max_bytes`.
///
/// Chunks are counted as they arrive so an oversized upload is rejected
/// without buffering all of it.
pub(crate) async fn read_form(mut multipart: Multipart, max_bytes: usize) -> Result<UploadForm, RelayError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("").to_string();
            let mut bytes = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| multipart_error(e, max_bytes))?
            {
                if bytes.len() + chunk.len() > max_bytes {
                    return Err(RelayError::PayloadTooLarge { limit: max_bytes });
                }
                bytes.extend_from_slice(&chunk);
            }
            debug!("Received file field '{}' ({} bytes)", filename, bytes.len());
            form.file = Some(UploadedFile { filename, bytes });
        } else if !name.is_empty() {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, max_bytes))?;
            form.text.insert(name, value);
        }
    }

    Ok(form)
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> RelayError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::PayloadTooLarge { limit: max_bytes }
    } else {
        RelayError::InvalidRequest(e.body_text())
    }
}

/// `POST /upload`
pub(crate) async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, RelayError> {
    let config = state.service.config();
    let form = read_form(multipart, config.max_upload_bytes).await?;
    let file = form.file.ok_or(RelayError::MissingFilePart)?;

    let staged = state.service.accept_upload(&file.bytes, &file.filename).await?;
    let deck = state.service.process_upload(&staged).await?;
    info!(
        "Upload {} → {} slides",
        deck.folder,
        deck.slide_urls.len()
    );
    Ok(Json(UploadResponse::from(deck)))
}

/// `GET /slides/{folder}/{filename}`
pub(crate) async fn get_slide(
    State(state): State<AppState>,
    Path((folder, filename)): Path<(String, String)>,
) -> Result<Json<LocateResponse>, RelayError> {
    Ok(Json(state.service.locate_slide(&folder, &filename).await?))
}

/// `GET /pdf/{filename}`
pub(crate) async fn get_pdf(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<LocateResponse>, RelayError> {
    Ok(Json(state.service.locate_pdf(&filename).await?))
}

/// `POST /screenshot`; optional text field `prompt`.
pub(crate) async fn screenshot(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ScreenshotResponse>, RelayError> {
    let form = read_form(multipart, state.service.config().max_upload_bytes).await?;
    let file = form.file.ok_or(RelayError::MissingFilePart)?;
    let prompt = form.text.get("prompt").map(String::as_str);
    Ok(Json(
        state
            .service
            .ingest_screenshot(file.bytes, &file.filename, prompt)
            .await?,
    ))
}

/// `POST /trans_quiz/get_questions`
pub(crate) async fn quiz(
    State(state): State<AppState>,
    body: Result<Json<QuizRequest>, JsonRejection>,
) -> Result<Json<Quiz>, RelayError> {
    let Json(request) = body.map_err(|e| RelayError::InvalidRequest(e.body_text()))?;
    Ok(Json(state.service.generate_quiz(&request.transcript).await?))
}

/// `GET /healthz`
pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.service.health())
}
