//! PDF rasterisation: render every slide of the converted PDF to JPEG.
//!
//! `pdfium-render` wraps a C++ library that is not async-aware, so all work
//! happens inside `spawn_blocking`. The library is bound per call from
//! `PDFIUM_LIB_PATH` or the system search path.
//!
//! Slide sizes vary (4:3, 16:9, custom poster sizes). The requested DPI is
//! honoured until the longest edge would exceed `max_rendered_pixels`; past
//! that the render is scaled down to fit.

use crate::error::{RelayError, SlideError};
use crate::pipeline::encode::encode_jpeg;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const POINTS_PER_INCH: f32 = 72.0;

/// One encoded slide image.
#[derive(Debug, Clone)]
pub struct RenderedSlide {
    /// 1-based slide number.
    pub number: usize,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Rasteriser result: the slides that made it, and the ones that didn't.
#[derive(Debug, Default)]
pub struct RasterOutput {
    pub slides: Vec<RenderedSlide>,
    pub errors: Vec<SlideError>,
}

impl RasterOutput {
    /// Slides attempted, successful or not.
    pub fn total(&self) -> usize {
        self.slides.len() + self.errors.len()
    }
}

/// Turns a PDF into one image per page.
#[async_trait]
pub trait SlideRasteriser: Send + Sync {
    async fn rasterise(&self, pdf: &Path) -> Result<RasterOutput, RelayError>;

    /// Short name for logs and `/healthz`.
    fn name(&self) -> &'static str;
}

/// Local rasteriser backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasteriser {
    lib_path: Option<PathBuf>,
    dpi: u32,
    max_rendered_pixels: u32,
    jpeg_quality: u8,
}

impl PdfiumRasteriser {
    pub fn new(lib_path: Option<PathBuf>, dpi: u32, max_rendered_pixels: u32, jpeg_quality: u8) -> Self {
        Self {
            lib_path,
            dpi,
            max_rendered_pixels,
            jpeg_quality,
        }
    }
}

#[async_trait]
impl SlideRasteriser for PdfiumRasteriser {
    async fn rasterise(&self, pdf: &Path) -> Result<RasterOutput, RelayError> {
        let this = self.clone();
        let path = pdf.to_path_buf();
        tokio::task::spawn_blocking(move || this.rasterise_blocking(&path))
            .await
            .map_err(|e| RelayError::Internal(format!("Render task panicked: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "pdfium"
    }
}

impl PdfiumRasteriser {
    fn rasterise_blocking(&self, pdf_path: &Path) -> Result<RasterOutput, RelayError> {
        let start = Instant::now();
        let pdfium = bind_pdfium(self.lib_path.as_deref())?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| RelayError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        info!("PDF loaded: {} slides", pages.len());

        let mut output = RasterOutput::default();
        for (idx, page) in pages.iter().enumerate() {
            let number = idx + 1;
            let (w, h) = target_dimensions(
                page.width().value,
                page.height().value,
                self.dpi,
                self.max_rendered_pixels,
            );
            let render_config = PdfRenderConfig::new()
                .set_target_width(w as i32)
                .set_maximum_height(h as i32);

            let image = match page.render_with_config(&render_config) {
                Ok(bitmap) => bitmap.as_image(),
                Err(e) => {
                    warn!("Slide {}: render failed: {:?}", number, e);
                    output.errors.push(SlideError::RenderFailed {
                        slide: number,
                        detail: format!("{:?}", e),
                    });
                    continue;
                }
            };

            match encode_jpeg(&image, self.jpeg_quality) {
                Ok(bytes) => {
                    debug!("Rendered slide {} → {}x{} px", number, image.width(), image.height());
                    output.slides.push(RenderedSlide {
                        number,
                        bytes,
                        content_type: "image/jpeg".to_string(),
                    });
                }
                Err(e) => {
                    warn!("Slide {}: JPEG encoding failed: {}", number, e);
                    output.errors.push(SlideError::EncodeFailed {
                        slide: number,
                        detail: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Rasterised {}/{} slides in {:?}",
            output.slides.len(),
            output.total(),
            start.elapsed()
        );
        Ok(output)
    }
}

/// Bind to libpdfium at `lib_path` (a file, or a directory holding the
/// platform library), or on the system search path when `None`.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, RelayError> {
    let bindings = match lib_path {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| RelayError::PdfiumBindingFailed(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

/// Pixel size for a page of `width_pts` × `height_pts` at `dpi`, scaled down
/// so neither edge exceeds `max_pixels`.
pub fn target_dimensions(width_pts: f32, height_pts: f32, dpi: u32, max_pixels: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let mut w = width_pts.max(1.0) * scale;
    let mut h = height_pts.max(1.0) * scale;
    let longest = w.max(h);
    if longest > max_pixels as f32 {
        let shrink = max_pixels as f32 / longest;
        w *= shrink;
        h *= shrink;
    }
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}
