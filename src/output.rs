//! Result types returned by the service and serialised by the HTTP layer.

use crate::error::SlideError;
use serde::{Deserialize, Serialize};

/// Everything produced for one uploaded presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideDeck {
    /// Upload id; every object of this upload is keyed by it.
    pub folder: String,
    /// Public URL of the converted PDF.
    pub pdf_url: String,
    /// Public URLs of the stored slide images, in slide order.
    pub slide_urls: Vec<String>,
    /// Slides that were skipped.
    pub errors: Vec<SlideError>,
    pub stats: ConversionStats,
}

/// Timings and counts for one upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionStats {
    pub total_slides: usize,
    pub stored_slides: usize,
    pub failed_slides: usize,
    pub convert_ms: u64,
    pub render_ms: u64,
    pub store_ms: u64,
    pub total_ms: u64,
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub slides: Vec<String>,
    pub folder: String,
    pub pdf: String,
}

impl From<SlideDeck> for UploadResponse {
    fn from(deck: SlideDeck) -> Self {
        Self {
            slides: deck.slide_urls,
            folder: deck.folder,
            pdf: deck.pdf_url,
        }
    }
}

/// Body of `GET /slides/...` and `GET /pdf/...`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocateResponse {
    pub url: String,
}

/// Body of a successful `POST /screenshot`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenshotResponse {
    pub url: String,
    pub text: String,
}

/// Body of `GET /healthz`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub rasteriser: String,
    pub generation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_response_uses_front_end_field_names() {
        let deck = SlideDeck {
            folder: "abc".into(),
            pdf_url: "http://h/abc.pdf".into(),
            slide_urls: vec!["http://h/abc/slide_abc_1.jpg".into()],
            errors: vec![],
            stats: ConversionStats::default(),
        };
        let v = serde_json::to_value(UploadResponse::from(deck)).unwrap();
        assert_eq!(v["folder"], "abc");
        assert_eq!(v["pdf"], "http://h/abc.pdf");
        assert_eq!(v["slides"][0], "http://h/abc/slide_abc_1.jpg");
        assert_eq!(v.as_object().unwrap().len(), 3);
    }
}
