//! Pipeline stages for presentation → PDF → slide images.
//!
//! Each submodule implements one transformation step, so backends can be
//! swapped (pdfium for PDF.co, say) without touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ convert ──▶ render ──▶ encode        postprocess
//! (stage)    (soffice)   (pdfium)   (JPEG/base64)  (model text cleanup)
//! ```
//!
//! 1. [`intake`] : validate the upload and write it to a staging `TempDir`
//! 2. [`convert`]: run the office suite headless to produce a PDF
//! 3. [`render`] : rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 4. [`encode`] : JPEG-encode rendered slides; base64-wrap images for the
//!    vision model
//! 5. [`postprocess`]: deterministic cleanup of generated text

pub mod convert;
pub mod encode;
pub mod intake;
pub mod postprocess;
pub mod render;
