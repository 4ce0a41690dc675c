//! # slide-relay
//!
//! Upload a presentation, get back a PDF and one image per slide.
//!
//! The crate does none of the heavy lifting itself. It relays each upload
//! through existing engines (an office suite for PPTX → PDF, pdfium or the
//! PDF.co API for PDF → JPEG, local disk or S3 for storage) and returns the
//! resulting URLs. The same backends serve two generative extras through any
//! `edgequake-llm` provider: screenshot transcription and quiz generation.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Intake     validate filename/extension, stage to a temp dir
//!  ├─ 2. Convert    PPTX → PDF (soffice --headless)
//!  ├─ 3. Store PDF  {id}.pdf
//!  ├─ 4. Rasterise  PDF → JPEG per slide (pdfium or PDF.co)
//!  ├─ 5. Store      {id}/slide_{id}_{n}.jpg, a failed slide is skipped
//!  └─ 6. Respond    {"slides": [...], "folder": id, "pdf": url}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slide_relay::{server, ServiceConfig, SlideService, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .storage(StorageBackend::Local { root: "./storage".into() })
//!         .build()?;
//!     let address = config.bind_address();
//!     let service = SlideService::from_config(config).await?;
//!     server::serve(service, &address, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slide-relay` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ai;
pub mod config;
pub mod error;
pub mod output;
pub mod pdfco;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod server;
pub mod service;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ai::quiz::{Quiz, QuizQuestion};
pub use ai::{GenerationRequest, Generated, LlmGenerator, TextGenerator};
pub use config::{
    GenerationSettings, PdfCoSettings, RasteriserBackend, ServiceConfig, ServiceConfigBuilder,
    StorageBackend,
};
pub use error::{RelayError, SlideError};
pub use output::{ConversionStats, SlideDeck, UploadResponse};
pub use pdfco::{PdfCoClient, PdfCoRasteriser};
pub use pipeline::convert::{PresentationConverter, SofficeConverter};
pub use pipeline::render::{PdfiumRasteriser, RasterOutput, RenderedSlide, SlideRasteriser};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::SlideService;
pub use storage::{LocalStore, ObjectStore, S3Store};
