//! Configuration types for the slide-relay service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! [`ServiceConfigBuilder`]. The binary maps CLI flags and environment
//! variables onto the builder; tests set only the fields they care about.
//! Backends are chosen here, not in code: the same handler serves a local
//! filesystem or an S3 bucket, and rasterises with pdfium or PDF.co.

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for the upload → convert → store pipeline and its HTTP surface.
///
/// # Example
/// ```rust
/// use slide_relay::{ServiceConfig, StorageBackend};
///
/// let config = ServiceConfig::builder()
///     .storage(StorageBackend::Local { root: "./storage".into() })
///     .dpi(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,

    /// Port to bind. Default: 5000.
    pub port: u16,

    /// Base URL clients reach this service on. Local-storage URLs are built
    /// from it. Default: `http://localhost:5000`.
    pub public_base_url: String,

    /// Accepted presentation extensions, lower-case without the dot. Default: `["pptx"]`.
    pub allowed_extensions: Vec<String>,

    /// Largest accepted upload in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Directory for per-upload staging dirs. `None` uses the OS temp dir.
    pub work_dir: Option<PathBuf>,

    /// Office-suite executable used for presentation → PDF. Default: `soffice`.
    pub soffice_path: PathBuf,

    /// Presentation → PDF timeout in seconds. Default: 120.
    pub conversion_timeout_secs: u64,

    /// Slide rendering DPI. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// A 300-DPI render of an oversized custom slide would otherwise allocate
    /// a huge bitmap.
    pub max_rendered_pixels: u32,

    /// JPEG quality for slide images (1–100). Default: 90.
    pub jpeg_quality: u8,

    /// Number of concurrent storage uploads per deck. Default: 4.
    pub store_concurrency: usize,

    /// Where the PDF and slide images go.
    pub storage: StorageBackend,

    /// Which engine turns the PDF into slide images.
    pub rasteriser: RasteriserBackend,

    /// Path to libpdfium (file or containing directory). `None` searches the
    /// system library path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// PDF.co credentials; required when `rasteriser` is [`RasteriserBackend::PdfCo`].
    pub pdfco: Option<PdfCoSettings>,

    /// Timeout for remote downloads and PDF.co calls in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Text-generation settings for screenshot ingestion and quizzes.
    pub generation: GenerationSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            public_base_url: "http://localhost:5000".to_string(),
            allowed_extensions: vec!["pptx".to_string()],
            max_upload_bytes: 50 * 1024 * 1024,
            work_dir: None,
            soffice_path: PathBuf::from("soffice"),
            conversion_timeout_secs: 120,
            dpi: 300,
            max_rendered_pixels: 4000,
            jpeg_quality: 90,
            store_concurrency: 4,
            storage: StorageBackend::default(),
            rasteriser: RasteriserBackend::default(),
            pdfium_lib_path: None,
            pdfco: None,
            download_timeout_secs: 120,
            generation: GenerationSettings::default(),
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("public_base_url", &self.public_base_url)
            .field("allowed_extensions", &self.allowed_extensions)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("soffice_path", &self.soffice_path)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("storage", &self.storage)
            .field("rasteriser", &self.rasteriser)
            .field("pdfco", &self.pdfco)
            .field("generation", &self.generation)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// `host:port` string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Human-readable allow-list, e.g. `.pptx` or `.pptx, .ppt`.
    pub fn allowed_extensions_display(&self) -> String {
        extensions_display(self.allowed_extensions.as_slice())
    }
}

/// Upper bound on LLM retries; backoff doubles per attempt.
pub const MAX_LLM_RETRIES: u32 = 10;

/// `.pptx, .ppt` style rendering of an extension allow-list.
pub fn extensions_display<S: AsRef<str>>(exts: &[S]) -> String {
    exts.iter()
        .map(|e| format!(".{}", e.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.public_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn allowed_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.allowed_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = path.into();
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs.max(1);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn store_concurrency(mut self, n: usize) -> Self {
        self.config.store_concurrency = n.max(1);
        self
    }

    pub fn storage(mut self, storage: StorageBackend) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn rasteriser(mut self, backend: RasteriserBackend) -> Self {
        self.config.rasteriser = backend;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn pdfco(mut self, settings: PdfCoSettings) -> Self {
        self.config.pdfco = Some(settings);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn generation(mut self, mut settings: GenerationSettings) -> Self {
        settings.max_retries = settings.max_retries.min(MAX_LLM_RETRIES);
        settings.api_timeout_secs = settings.api_timeout_secs.max(1);
        settings.quiz_questions = settings.quiz_questions.clamp(1, 50);
        self.config.generation = settings;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, RelayError> {
        let c = &self.config;
        if c.allowed_extensions.is_empty() {
            return Err(RelayError::InvalidConfig(
                "At least one allowed upload extension is required".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(RelayError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        url::Url::parse(&c.public_base_url).map_err(|e| {
            RelayError::InvalidConfig(format!(
                "public_base_url '{}' is not a valid URL: {}",
                c.public_base_url, e
            ))
        })?;
        if let StorageBackend::S3 { bucket, region, .. } = &c.storage {
            validate_bucket_name(bucket)?;
            validate_region(region)?;
        }
        if c.rasteriser == RasteriserBackend::PdfCo {
            match &c.pdfco {
                Some(s) if !s.api_key.trim().is_empty() => {}
                _ => {
                    return Err(RelayError::InvalidConfig(
                        "The PDF.co rasteriser needs an API key (PDFCO_API_KEY)".into(),
                    ))
                }
            }
        }
        Ok(self.config)
    }
}

fn validate_bucket_name(bucket: &str) -> Result<(), RelayError> {
    if bucket.len() < 3 || bucket.len() > 63 {
        return Err(RelayError::InvalidConfig(format!(
            "S3 bucket name '{bucket}' must be between 3 and 63 characters"
        )));
    }
    if !bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(RelayError::InvalidConfig(format!(
            "S3 bucket name '{bucket}' can only contain lowercase letters, numbers, hyphens, and dots"
        )));
    }
    if bucket.starts_with('-') || bucket.ends_with('-') {
        return Err(RelayError::InvalidConfig(format!(
            "S3 bucket name '{bucket}' cannot start or end with a hyphen"
        )));
    }
    Ok(())
}

fn validate_region(region: &str) -> Result<(), RelayError> {
    if region.is_empty()
        || !region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(RelayError::InvalidConfig(format!(
            "AWS region '{region}' can only contain lowercase letters, numbers, and hyphens"
        )));
    }
    Ok(())
}

// ── Backends ─────────────────────────────────────────────────────────────

/// Where converted PDFs and slide images are persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageBackend {
    /// Files under `root`, served back by this service at `/files`.
    Local { root: PathBuf },
    /// An S3 (or S3-compatible) bucket.
    S3 {
        bucket: String,
        region: String,
        /// Custom endpoint for S3-compatible stores (MinIO, R2, …).
        endpoint_url: Option<String>,
        /// Overrides the `https://{bucket}.s3.{region}.amazonaws.com` URL base.
        public_base_url: Option<String>,
        /// Static credentials; when unset the standard AWS chain is used.
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    },
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::Local {
            root: PathBuf::from("storage"),
        }
    }
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Local { root } => f.debug_struct("Local").field("root", root).finish(),
            StorageBackend::S3 {
                bucket,
                region,
                endpoint_url,
                public_base_url,
                access_key_id,
                ..
            } => f
                .debug_struct("S3")
                .field("bucket", bucket)
                .field("region", region)
                .field("endpoint_url", endpoint_url)
                .field("public_base_url", public_base_url)
                .field("access_key_id", &access_key_id.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Engine that turns the converted PDF into slide images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasteriserBackend {
    /// Local pdfium library (default).
    #[default]
    Pdfium,
    /// PDF.co web API.
    PdfCo,
}

/// PDF.co web API settings.
#[derive(Clone)]
pub struct PdfCoSettings {
    pub api_key: String,
    /// Default: `https://api.pdf.co/v1`.
    pub base_url: String,
    /// Page selection passed through to PDF.co, e.g. `0,2-5`. Empty = all pages.
    pub pages: String,
    /// Password for protected PDFs. Empty = none.
    pub password: String,
}

impl PdfCoSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.pdf.co/v1".to_string(),
            pages: String::new(),
            password: String::new(),
        }
    }

    pub fn with_pages(mut self, pages: impl Into<String>) -> Self {
        self.pages = pages.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl fmt::Debug for PdfCoSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfCoSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("pages", &self.pages)
            .field(
                "password",
                &if self.password.is_empty() { "" } else { "<redacted>" },
            )
            .finish()
    }
}

/// Settings for the generative-text endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Disable the AI endpoints even when a provider could be detected.
    pub enabled: bool,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Model identifier. If None, uses `gpt-4.1-nano` or the provider default.
    pub model: Option<String>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens per completion. Default: 2048.
    pub max_tokens: usize,

    /// Retries on a failed LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Number of questions requested per quiz. Default: 5.
    pub quiz_questions: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_name: None,
            model: None,
            temperature: 0.2,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            quiz_questions: 5,
        }
    }
}
