//! Error types for the slide-relay service.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RelayError`]: **Fatal**: the request cannot be served at all (bad
//!   upload, conversion engine failed, storage rejected the PDF). Returned as
//!   `Err(RelayError)` from service operations and rendered as a JSON
//!   `{"error": ...}` body with a status code by the HTTP layer.
//!
//! * [`SlideError`]: **Non-fatal**: a single slide failed to render, download
//!   or store, while the rest of the deck is fine. Collected in
//!   [`crate::output::SlideDeck::errors`] so an upload with one broken slide
//!   still returns the other slides.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// All fatal errors returned by the slide-relay library.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The multipart body has no `file` field.
    #[error("No file part")]
    MissingFilePart,

    /// The `file` field was present but carried no filename.
    #[error("No selected file")]
    NoSelectedFile,

    /// The filename extension is not on the allow-list.
    #[error("Invalid file type. Only {allowed} allowed")]
    InvalidFileType { filename: String, allowed: String },

    /// The uploaded file has zero bytes.
    #[error("Uploaded file '{filename}' is empty")]
    EmptyUpload { filename: String },

    /// The uploaded file exceeds the configured size limit.
    #[error("File exceeds the maximum allowed size of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The request body could not be parsed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A storage key or path segment was rejected before touching storage.
    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The presentation-to-PDF engine failed.
    #[error("Presentation conversion failed for '{path}': {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    /// The presentation-to-PDF engine did not finish in time.
    #[error("Presentation conversion timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    /// The converter produced a file that is not a PDF.
    #[error("File is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// pdfium could not open the PDF.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Every slide failed; there is nothing to return.
    #[error("No images were generated from the PDF.")]
    NoSlidesGenerated { total: usize, first_error: Option<String> },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium on the library search path."
    )]
    PdfiumBindingFailed(String),

    // ── Remote API errors ─────────────────────────────────────────────────
    /// A third-party HTTP API returned an error or an unusable response.
    #[error("{service} error: {message}")]
    RemoteApi { service: String, message: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The storage backend rejected an operation.
    #[error("Storage backend '{backend}' failed: {detail}")]
    Storage { backend: String, detail: String },

    /// The storage backend has no usable credentials.
    #[error("Credentials not available")]
    CredentialsUnavailable,

    /// The requested object does not exist.
    #[error("{resource} '{key}' not found")]
    NotFound { resource: String, key: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// No LLM provider is configured (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM call failed after all retries.
    #[error("Text generation failed after {retries} retries: {detail}")]
    GenerationFailed { retries: u32, detail: String },

    /// The model answered, but not in the shape we asked for.
    #[error("Model returned unusable output: {detail}")]
    InvalidModelOutput { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Local file-system failure on a staging or storage path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Build an [`RelayError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RelayError::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingFilePart
            | RelayError::NoSelectedFile
            | RelayError::InvalidFileType { .. }
            | RelayError::EmptyUpload { .. }
            | RelayError::InvalidRequest(_)
            | RelayError::InvalidKey { .. } => StatusCode::BAD_REQUEST,
            RelayError::CredentialsUnavailable => StatusCode::FORBIDDEN,
            RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
            RelayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::RemoteApi { .. }
            | RelayError::GenerationFailed { .. }
            | RelayError::InvalidModelOutput { .. } => StatusCode::BAD_GATEWAY,
            RelayError::ProviderNotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::ConversionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RelayError::ConversionFailed { .. }
            | RelayError::NotAPdf { .. }
            | RelayError::CorruptPdf { .. }
            | RelayError::NoSlidesGenerated { .. }
            | RelayError::PdfiumBindingFailed(_)
            | RelayError::Storage { .. }
            | RelayError::InvalidConfig(_)
            | RelayError::Io { .. }
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to an HTTP client.
    ///
    /// Local paths and internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::Io { .. } | RelayError::Internal(_) | RelayError::InvalidConfig(_) => {
                "Internal server error".to_string()
            }
            RelayError::Storage { .. } => "Storage backend is unavailable".to_string(),
            RelayError::ConversionFailed { detail, .. } => {
                format!("Presentation conversion failed: {detail}")
            }
            RelayError::NotAPdf { .. } => "Converter did not produce a valid PDF".to_string(),
            RelayError::CorruptPdf { detail, .. } => format!("Converted PDF is unreadable: {detail}"),
            RelayError::PdfiumBindingFailed(_) => "PDF rasteriser is unavailable".to_string(),
            RelayError::ProviderNotConfigured { provider, .. } => {
                format!("Text generation is not configured (provider '{provider}')")
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", self);
        } else {
            tracing::debug!("Client error: {}", self);
        }

        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

/// A non-fatal error for a single slide.
///
/// The upload continues unless ALL slides fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlideError {
    /// Slide rasterisation failed.
    #[error("Slide {slide}: rasterisation failed: {detail}")]
    RenderFailed { slide: usize, detail: String },

    /// The rendered bitmap could not be encoded.
    #[error("Slide {slide}: image encoding failed: {detail}")]
    EncodeFailed { slide: usize, detail: String },

    /// A remote rasteriser produced a URL we could not fetch.
    #[error("Slide {slide}: download failed: {detail}")]
    DownloadFailed { slide: usize, detail: String },

    /// The storage backend rejected the slide image.
    #[error("Slide {slide}: upload to storage failed: {detail}")]
    StoreFailed { slide: usize, detail: String },
}

impl SlideError {
    /// 1-based slide number the error belongs to.
    pub fn slide(&self) -> usize {
        match self {
            SlideError::RenderFailed { slide, .. }
            | SlideError::EncodeFailed { slide, .. }
            | SlideError::DownloadFailed { slide, .. }
            | SlideError::StoreFailed { slide, .. } => *slide,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_errors_have_client_facing_messages() {
        assert_eq!(RelayError::MissingFilePart.to_string(), "No file part");
        assert_eq!(RelayError::NoSelectedFile.to_string(), "No selected file");
        let e = RelayError::InvalidFileType {
            filename: "notes.txt".into(),
            allowed: ".pptx".into(),
        };
        assert_eq!(e.to_string(), "Invalid file type. Only .pptx allowed");
    }

    #[test]
    fn status_codes() {
        assert_eq!(RelayError::NoSelectedFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::CredentialsUnavailable.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RelayError::NotFound {
                resource: "Slide".into(),
                key: "a/b.jpg".into()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RelayError::ConversionTimeout { secs: 5 }.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            RelayError::NoSlidesGenerated {
                total: 3,
                first_error: None
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let e = RelayError::io(
            "/var/tmp/secret/deck.pptx",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert!(e.to_string().contains("/var/tmp/secret"));
        assert_eq!(e.user_message(), "Internal server error");

        let e = RelayError::Storage {
            backend: "s3://decks".into(),
            detail: "head_object: raw: Response { status: 500, headers: {..} }".into(),
        };
        assert!(e.to_string().contains("raw: Response"));
        assert_eq!(e.user_message(), "Storage backend is unavailable");
    }

    #[test]
    fn slide_error_number() {
        let e = SlideError::StoreFailed {
            slide: 4,
            detail: "timeout".into(),
        };
        assert_eq!(e.slide(), 4);
        assert!(e.to_string().contains("Slide 4"));
    }

    #[test]
    fn slide_error_serialises_with_kind_tag() {
        let e = SlideError::RenderFailed {
            slide: 2,
            detail: "bad page".into(),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["kind"], "render_failed");
        assert_eq!(v["slide"], 2);
    }
}
