//! CLI binary for slide-relay.
//!
//! A thin shim over the library crate: `serve` maps flags onto
//! `ServiceConfig` and runs the HTTP service, `convert` pushes one deck
//! through the same pipeline from the terminal.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use slide_relay::{
    server, ConversionProgressCallback, GenerationSettings, PdfCoSettings, ProgressCallback,
    RasteriserBackend, ServiceConfig, SlideService, StorageBackend,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while the deck converts, then a bar that
/// advances as slides land in storage (possibly out of order).
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Converting");
        bar.set_message("presentation → PDF → slides…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Storing");
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_slides: usize) {
        self.activate_bar(total_slides);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Storing {total_slides} slides…"))
        ));
    }

    fn on_slide_stored(&self, slide: usize, total: usize, url: &str) {
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            green("✓"),
            slide,
            total,
            dim(url),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            red("✗"),
            slide,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_slides: usize, stored: usize) {
        let failed = total_slides.saturating_sub(stored);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!("{} {} slides stored", green("✔"), bold(&stored.to_string()));
        } else {
            eprintln!(
                "{} {}/{} slides stored  ({} failed)",
                if stored == 0 { red("✘") } else { cyan("⚠") },
                bold(&stored.to_string()),
                total_slides,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Local storage, pdfium rendering, served on :5000
  slide-relay serve --storage-dir ./storage

  # S3 storage, PDF.co rendering
  BUCKET_NAME=decks AWS_REGION=eu-west-1 PDFCO_API_KEY=... \
    slide-relay serve --storage s3 --rasteriser pdfco

  # One-off conversion with a progress bar
  slide-relay convert lecture.pptx

ENVIRONMENT VARIABLES:
  BUCKET_NAME, AWS_REGION       S3 bucket and region (--storage s3)
  AWS_ACCESS_KEY, AWS_SECRET_KEY
                                Static S3 credentials (else the AWS default chain)
  PDFCO_API_KEY                 PDF.co key (--rasteriser pdfco)
  PDFCO_PASSWORD                Password for protected PDFs sent to PDF.co
  PDFIUM_LIB_PATH               libpdfium file or directory
  OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY
                                Enable /screenshot and /trans_quiz/get_questions
  RUST_LOG                      Log filter (overrides --verbose/--quiet)

  A .env file in the working directory is loaded first.
"#;

/// Upload presentations, get PDFs and slide images back.
#[derive(Parser, Debug)]
#[command(
    name = "slide-relay",
    version,
    about = "Convert presentations to PDF and per-slide images, store them, return URLs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SLIDE_RELAY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SLIDE_RELAY_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Interface to bind.
        #[arg(long, env = "SLIDE_RELAY_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to bind.
        #[arg(long, env = "SLIDE_RELAY_PORT", default_value_t = 5000)]
        port: u16,

        #[command(flatten)]
        backends: BackendArgs,
    },
    /// Convert one presentation and print the result as JSON.
    Convert {
        /// Presentation file.
        input: PathBuf,

        /// Disable progress bar.
        #[arg(long, env = "SLIDE_RELAY_NO_PROGRESS")]
        no_progress: bool,

        #[command(flatten)]
        backends: BackendArgs,
    },
}

#[derive(Args, Debug)]
struct BackendArgs {
    /// Base URL clients use to reach this service (local-storage URLs).
    #[arg(long, env = "SLIDE_RELAY_PUBLIC_URL", default_value = "http://localhost:5000")]
    public_url: String,

    /// Accepted upload extensions, comma separated.
    #[arg(long, env = "SLIDE_RELAY_EXTENSIONS", value_delimiter = ',', default_value = "pptx")]
    extensions: Vec<String>,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "SLIDE_RELAY_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Parent directory for per-upload staging dirs.
    #[arg(long, env = "SLIDE_RELAY_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Office-suite executable.
    #[arg(long, env = "SOFFICE_PATH", default_value = "soffice")]
    soffice: PathBuf,

    /// Presentation → PDF timeout in seconds.
    #[arg(long, env = "SLIDE_RELAY_CONVERT_TIMEOUT", default_value_t = 120)]
    convert_timeout: u64,

    /// Storage backend.
    #[arg(long, env = "SLIDE_RELAY_STORAGE", value_enum, default_value = "local")]
    storage: StorageArg,

    /// Root directory for local storage.
    #[arg(long, env = "SLIDE_RELAY_STORAGE_DIR", default_value = "storage")]
    storage_dir: PathBuf,

    /// S3 bucket.
    #[arg(long, env = "BUCKET_NAME")]
    bucket: Option<String>,

    /// S3 region.
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// Custom S3 endpoint (MinIO, R2, …).
    #[arg(long, env = "S3_ENDPOINT_URL")]
    s3_endpoint: Option<String>,

    /// Public URL base for stored objects, overriding the bucket URL.
    #[arg(long, env = "S3_PUBLIC_URL")]
    s3_public_url: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY", hide_env_values = true)]
    aws_access_key: Option<String>,

    #[arg(long, env = "AWS_SECRET_KEY", hide_env_values = true)]
    aws_secret_key: Option<String>,

    /// PDF → image engine.
    #[arg(long, env = "SLIDE_RELAY_RASTERISER", value_enum, default_value = "pdfium")]
    rasteriser: RasteriserArg,

    /// libpdfium file or containing directory.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "SLIDE_RELAY_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Longest rendered edge in pixels.
    #[arg(long, env = "SLIDE_RELAY_MAX_PIXELS", default_value_t = 4000)]
    max_pixels: u32,

    /// JPEG quality (1–100).
    #[arg(long, env = "SLIDE_RELAY_JPEG_QUALITY", default_value_t = 90)]
    jpeg_quality: u8,

    /// Concurrent storage uploads / PDF.co downloads.
    #[arg(long, env = "SLIDE_RELAY_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    #[arg(long, env = "PDFCO_API_KEY", hide_env_values = true)]
    pdfco_api_key: Option<String>,

    #[arg(long, env = "PDFCO_BASE_URL", default_value = "https://api.pdf.co/v1")]
    pdfco_base_url: String,

    /// PDF.co page selection, e.g. `0,2-5`. Empty = all.
    #[arg(long, env = "PDFCO_PAGES", default_value = "")]
    pdfco_pages: String,

    /// Password for protected PDFs (PDF.co only).
    #[arg(long, env = "PDFCO_PASSWORD", hide_env_values = true)]
    pdfco_password: Option<String>,

    /// HTTP timeout for PDF.co calls and downloads, in seconds.
    #[arg(long, env = "SLIDE_RELAY_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Disable /screenshot and quiz generation.
    #[arg(long, env = "SLIDE_RELAY_NO_AI")]
    no_ai: bool,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "SLIDE_RELAY_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Questions per generated quiz.
    #[arg(long, env = "SLIDE_RELAY_QUIZ_QUESTIONS", default_value_t = 5)]
    quiz_questions: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StorageArg {
    Local,
    S3,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RasteriserArg {
    Pdfium,
    Pdfco,
}

impl From<RasteriserArg> for RasteriserBackend {
    fn from(v: RasteriserArg) -> Self {
        match v {
            RasteriserArg::Pdfium => RasteriserBackend::Pdfium,
            RasteriserArg::Pdfco => RasteriserBackend::PdfCo,
        }
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so `.env` values feed the `env = ...` fallbacks.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for `convert`.
    let show_progress = matches!(
        &cli.command,
        Command::Convert { no_progress: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            host,
            port,
            backends,
        } => {
            let config = build_config(&backends, Some((host, port)))?;
            let address = config.bind_address();
            let service = SlideService::from_config(config)
                .await
                .context("Failed to initialise backends")?;
            server::serve(service, &address, shutdown_signal())
                .await
                .with_context(|| format!("Server on {address} failed"))?;
        }
        Command::Convert {
            input,
            backends,
            ..
        } => {
            let config = build_config(&backends, None)?;
            let mut service = SlideService::from_config(config)
                .await
                .context("Failed to initialise backends")?;
            if show_progress {
                let cb: ProgressCallback = CliProgressCallback::new_dynamic();
                service = service.with_progress(cb);
            }

            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let filename = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let staged = service
                .accept_upload(&bytes, &filename)
                .await
                .context("Upload rejected")?;
            let deck = service
                .process_upload(&staged)
                .await
                .context("Conversion failed")?;

            println!(
                "{}",
                serde_json::to_string_pretty(&deck).context("Failed to serialise output")?
            );
            if !cli.quiet {
                eprintln!(
                    "   {}  convert {}ms  /  render {}ms  /  store {}ms",
                    bold(&deck.folder),
                    deck.stats.convert_ms,
                    deck.stats.render_ms,
                    deck.stats.store_ms,
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(args: &BackendArgs, bind: Option<(String, u16)>) -> Result<ServiceConfig> {
    let storage = match args.storage {
        StorageArg::Local => StorageBackend::Local {
            root: args.storage_dir.clone(),
        },
        StorageArg::S3 => StorageBackend::S3 {
            bucket: args
                .bucket
                .clone()
                .context("--bucket (BUCKET_NAME) is required with --storage s3")?,
            region: args.region.clone(),
            endpoint_url: args.s3_endpoint.clone(),
            public_base_url: args.s3_public_url.clone(),
            access_key_id: args.aws_access_key.clone(),
            secret_access_key: args.aws_secret_key.clone(),
        },
    };

    let generation = GenerationSettings {
        enabled: !args.no_ai,
        provider_name: args.provider.clone(),
        model: args.model.clone(),
        api_timeout_secs: args.api_timeout,
        quiz_questions: args.quiz_questions.max(1),
        ..Default::default()
    };

    let mut builder = ServiceConfig::builder()
        .public_base_url(&args.public_url)
        .allowed_extensions(&args.extensions)
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024))
        .soffice_path(&args.soffice)
        .conversion_timeout_secs(args.convert_timeout)
        .storage(storage)
        .rasteriser(args.rasteriser.into())
        .dpi(args.dpi)
        .max_rendered_pixels(args.max_pixels)
        .jpeg_quality(args.jpeg_quality)
        .store_concurrency(args.concurrency)
        .download_timeout_secs(args.download_timeout)
        .generation(generation);

    if let Some((host, port)) = bind {
        builder = builder.host(host).port(port);
    }
    if let Some(ref dir) = args.work_dir {
        builder = builder.work_dir(dir);
    }
    if let Some(ref lib) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(ref key) = args.pdfco_api_key {
        let mut settings = PdfCoSettings::new(key)
            .with_base_url(&args.pdfco_base_url)
            .with_pages(&args.pdfco_pages);
        if let Some(ref password) = args.pdfco_password {
            settings = settings.with_password(password);
        }
        builder = builder.pdfco(settings);
    }

    builder.build().context("Invalid configuration")
}
