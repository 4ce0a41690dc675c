//! Pipeline orchestration: upload → PDF → slide images → storage → URLs.
//!
//! [`SlideService`] owns one instance of each backend behind its trait and is
//! shared by every request handler. It holds no per-request state; each
//! upload lives in its own [`StagedUpload`] directory.

use crate::ai::quiz::{parse_quiz, Quiz};
use crate::ai::{GenerationRequest, LlmGenerator, TextGenerator};
use crate::config::{extensions_display, RasteriserBackend, ServiceConfig};
use crate::error::{RelayError, SlideError};
use crate::output::{ConversionStats, HealthResponse, LocateResponse, ScreenshotResponse, SlideDeck};
use crate::pdfco::PdfCoRasteriser;
use crate::pipeline::convert::{PresentationConverter, SofficeConverter};
use crate::pipeline::encode::{image_data, image_mime_type};
use crate::pipeline::intake::{
    extension_of, stage_upload, validate_filename, validate_segment, StagedUpload, UploadId,
};
use crate::pipeline::postprocess::clean_text;
use crate::pipeline::render::{PdfiumRasteriser, RenderedSlide, SlideRasteriser};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::prompts::{
    quiz_prompt, DEFAULT_SCREENSHOT_PROMPT, QUIZ_SYSTEM_PROMPT, SCREENSHOT_SYSTEM_PROMPT,
};
use crate::storage::{build_store, ObjectStore};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Screenshot formats the vision endpoint accepts.
pub const SCREENSHOT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Shared handle to every backend the HTTP handlers need.
#[derive(Clone)]
pub struct SlideService {
    config: Arc<ServiceConfig>,
    converter: Arc<dyn PresentationConverter>,
    rasteriser: Arc<dyn SlideRasteriser>,
    store: Arc<dyn ObjectStore>,
    generator: Option<Arc<dyn TextGenerator>>,
    generation_hint: String,
    progress: ProgressCallback,
}

impl SlideService {
    pub fn new(
        config: ServiceConfig,
        converter: Arc<dyn PresentationConverter>,
        rasteriser: Arc<dyn SlideRasteriser>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            converter,
            rasteriser,
            store,
            generator: None,
            generation_hint: "No text generator configured.".to_string(),
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Build every backend named by `config`.
    ///
    /// A missing LLM provider is not fatal: conversion still works and the
    /// generative endpoints answer 503.
    pub async fn from_config(config: ServiceConfig) -> Result<Self, RelayError> {
        let converter = Arc::new(SofficeConverter::new(
            &config.soffice_path,
            Duration::from_secs(config.conversion_timeout_secs),
        ));

        let rasteriser: Arc<dyn SlideRasteriser> = match config.rasteriser {
            RasteriserBackend::Pdfium => Arc::new(PdfiumRasteriser::new(
                config.pdfium_lib_path.clone(),
                config.dpi,
                config.max_rendered_pixels,
                config.jpeg_quality,
            )),
            RasteriserBackend::PdfCo => {
                let settings = config.pdfco.as_ref().ok_or_else(|| {
                    RelayError::InvalidConfig("PDF.co settings are missing".into())
                })?;
                Arc::new(PdfCoRasteriser::from_settings(
                    settings,
                    Duration::from_secs(config.download_timeout_secs),
                    config.store_concurrency,
                )?)
            }
        };

        let store = build_store(&config).await?;

        let mut generator: Option<Arc<dyn TextGenerator>> = None;
        let mut generation_hint = "Text generation is disabled.".to_string();
        if config.generation.enabled {
            match LlmGenerator::from_settings(&config.generation) {
                Ok(g) => {
                    info!("Text generation via {}", g.describe());
                    generator = Some(Arc::new(g));
                }
                Err(e) => {
                    warn!("Text generation unavailable: {}", e);
                    generation_hint = e.to_string();
                }
            }
        }

        info!(
            "Backends: converter={} rasteriser={} storage={}",
            converter.name(),
            rasteriser.name(),
            store.name()
        );

        Ok(Self {
            config: Arc::new(config),
            converter,
            rasteriser,
            store,
            generator,
            generation_hint,
            progress: Arc::new(NoopProgressCallback),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Directory to serve at `/files`, when storage is local.
    pub fn local_root(&self) -> Option<&Path> {
        self.store.local_root()
    }

    /// Validate the client filename and stage the bytes for conversion.
    pub async fn accept_upload(&self, bytes: &[u8], filename: &str) -> Result<StagedUpload, RelayError> {
        validate_filename(filename, &self.config.allowed_extensions)?;
        stage_upload(
            bytes,
            filename,
            self.config.max_upload_bytes,
            self.config.work_dir.as_deref(),
        )
        .await
    }

    /// Convert a staged presentation and store its PDF and slide images.
    pub async fn process_upload(&self, staged: &StagedUpload) -> Result<SlideDeck, RelayError> {
        let total_start = Instant::now();
        let id = staged.id();
        info!("Processing upload {} ({})", id, staged.filename());

        // ── 1. Presentation → PDF ─────────────────────────────────────────
        let start = Instant::now();
        let pdf_path = self.converter.to_pdf(staged.path(), staged.dir()).await?;
        let convert_ms = start.elapsed().as_millis() as u64;
        info!("Converted to PDF in {}ms", convert_ms);

        // ── 2. Store the PDF ──────────────────────────────────────────────
        let pdf_bytes = tokio::fs::read(&pdf_path)
            .await
            .map_err(|e| RelayError::io(&pdf_path, e))?;
        let pdf_url = self
            .store
            .put(&format!("{id}.pdf"), pdf_bytes, "application/pdf")
            .await?;

        // ── 3. PDF → slide images ─────────────────────────────────────────
        let start = Instant::now();
        let raster = self.rasteriser.rasterise(&pdf_path).await?;
        let render_ms = start.elapsed().as_millis() as u64;
        let total = raster.total();
        info!("Rasterised {} slides in {}ms", raster.slides.len(), render_ms);

        self.progress.on_conversion_start(total);
        let mut errors = raster.errors;
        for e in &errors {
            self.progress.on_slide_error(e.slide(), total, &e.to_string());
        }

        // ── 4. Store slide images ─────────────────────────────────────────
        let start = Instant::now();
        let results: Vec<(usize, Result<String, RelayError>)> = stream::iter(raster.slides)
            .map(|slide| self.store_slide(id, slide))
            .buffered(self.config.store_concurrency.max(1))
            .collect()
            .await;

        let mut slide_urls = Vec::with_capacity(results.len());
        for (number, result) in results {
            match result {
                Ok(url) => {
                    self.progress.on_slide_stored(number, total, &url);
                    slide_urls.push(url);
                }
                Err(e) => {
                    warn!("Slide {}: storage failed: {}", number, e);
                    self.progress.on_slide_error(number, total, &e.to_string());
                    errors.push(SlideError::StoreFailed {
                        slide: number,
                        detail: e.to_string(),
                    });
                }
            }
        }
        let store_ms = start.elapsed().as_millis() as u64;
        errors.sort_by_key(SlideError::slide);

        self.progress.on_conversion_complete(total, slide_urls.len());

        if slide_urls.is_empty() {
            return Err(RelayError::NoSlidesGenerated {
                total,
                first_error: errors.first().map(|e| e.to_string()),
            });
        }

        let stats = ConversionStats {
            total_slides: total,
            stored_slides: slide_urls.len(),
            failed_slides: errors.len(),
            convert_ms,
            render_ms,
            store_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Upload {} done: {}/{} slides in {}ms",
            id, stats.stored_slides, stats.total_slides, stats.total_ms
        );

        Ok(SlideDeck {
            folder: id.to_string(),
            pdf_url,
            slide_urls,
            errors,
            stats,
        })
    }

    async fn store_slide(&self, id: UploadId, slide: RenderedSlide) -> (usize, Result<String, RelayError>) {
        let ext = match slide.content_type.as_str() {
            "image/png" => "png",
            _ => "jpg",
        };
        let key = format!("{id}/slide_{id}_{}.{ext}", slide.number);
        let result = self.store.put(&key, slide.bytes, &slide.content_type).await;
        (slide.number, result)
    }

    /// URL of a stored slide image, if it exists.
    pub async fn locate_slide(&self, folder: &str, filename: &str) -> Result<LocateResponse, RelayError> {
        let folder: UploadId = folder.parse()?;
        validate_segment(filename)?;
        let key = format!("{folder}/{filename}");
        self.locate("Slide", &key).await
    }

    /// URL of a stored PDF, if it exists.
    pub async fn locate_pdf(&self, filename: &str) -> Result<LocateResponse, RelayError> {
        validate_segment(filename)?;
        self.locate("PDF", filename).await
    }

    async fn locate(&self, resource: &str, key: &str) -> Result<LocateResponse, RelayError> {
        if self.store.exists(key).await? {
            Ok(LocateResponse {
                url: self.store.public_url(key),
            })
        } else {
            Err(RelayError::NotFound {
                resource: resource.to_string(),
                key: key.to_string(),
            })
        }
    }

    fn generator(&self) -> Result<&Arc<dyn TextGenerator>, RelayError> {
        self.generator
            .as_ref()
            .ok_or_else(|| RelayError::ProviderNotConfigured {
                provider: self
                    .config
                    .generation
                    .provider_name
                    .clone()
                    .unwrap_or_else(|| "auto".to_string()),
                hint: self.generation_hint.clone(),
            })
    }

    /// Store a screenshot and transcribe it with the vision model.
    pub async fn ingest_screenshot(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        prompt: Option<&str>,
    ) -> Result<ScreenshotResponse, RelayError> {
        if filename.trim().is_empty() {
            return Err(RelayError::NoSelectedFile);
        }
        let ext = extension_of(filename)
            .filter(|e| SCREENSHOT_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| RelayError::InvalidFileType {
                filename: filename.to_string(),
                allowed: extensions_display(SCREENSHOT_EXTENSIONS),
            })?;
        if bytes.is_empty() {
            return Err(RelayError::EmptyUpload {
                filename: filename.to_string(),
            });
        }
        if bytes.len() > self.config.max_upload_bytes {
            return Err(RelayError::PayloadTooLarge {
                limit: self.config.max_upload_bytes,
            });
        }
        let generator = self.generator()?;
        let mime = image_mime_type(&ext).unwrap_or("application/octet-stream");

        let image = image_data(&bytes, mime);
        let key = format!("screenshots/{}.{}", UploadId::new(), ext);
        let url = self.store.put(&key, bytes, mime).await?;

        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_SCREENSHOT_PROMPT);
        let generated = generator
            .generate(GenerationRequest::text(SCREENSHOT_SYSTEM_PROMPT, prompt).with_image(image))
            .await?;
        info!(
            "Screenshot {} transcribed: {} input / {} output tokens",
            key, generated.input_tokens, generated.output_tokens
        );

        Ok(ScreenshotResponse {
            url,
            text: clean_text(&generated.text),
        })
    }

    /// Generate a multiple-choice quiz from a lecture transcript.
    pub async fn generate_quiz(&self, transcript: &str) -> Result<Quiz, RelayError> {
        if transcript.trim().is_empty() {
            return Err(RelayError::InvalidRequest("Transcript is required".into()));
        }
        let generator = self.generator()?;
        let prompt = quiz_prompt(transcript, self.config.generation.quiz_questions);
        let generated = generator
            .generate(GenerationRequest::text(QUIZ_SYSTEM_PROMPT, prompt))
            .await?;
        let quiz = parse_quiz(&generated.text)?;
        info!("Generated quiz with {} questions", quiz.questions.len());
        Ok(quiz)
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
            storage: self.store.name().to_string(),
            rasteriser: self.rasteriser.name().to_string(),
            generation: self.generator.is_some(),
        }
    }
}
