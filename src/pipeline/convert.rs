//! Presentation → PDF conversion through a headless office suite.
//!
//! `soffice` is single-instance per user profile: two concurrent conversions
//! sharing `~/.config/libreoffice` block each other or fail outright. Each
//! conversion therefore gets a throwaway profile inside the upload's staging
//! directory via `-env:UserInstallation`.

use crate::error::RelayError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Turns a presentation file into a PDF.
#[async_trait]
pub trait PresentationConverter: Send + Sync {
    /// Convert `input`, writing the PDF into `out_dir`. Returns the PDF path.
    async fn to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, RelayError>;

    /// Short name for logs and `/healthz`.
    fn name(&self) -> &'static str;
}

/// Runs `soffice --headless --convert-to pdf` as a child process.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    program: PathBuf,
    timeout: Duration,
}

impl SofficeConverter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, input: &Path, out_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless").arg("--norestore");
        if let Ok(profile) = url::Url::from_directory_path(out_dir.join(".soffice-profile")) {
            cmd.arg(format!("-env:UserInstallation={profile}"));
        }
        cmd.arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PresentationConverter for SofficeConverter {
    async fn to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, RelayError> {
        let failed = |detail: String| RelayError::ConversionFailed {
            path: input.to_path_buf(),
            detail,
        };

        info!("Converting {} to PDF", input.display());
        let output = match tokio::time::timeout(self.timeout, self.command(input, out_dir).output())
            .await
        {
            Err(_) => {
                return Err(RelayError::ConversionTimeout {
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) => {
                return Err(failed(format!(
                    "could not start '{}': {}",
                    self.program.display(),
                    e
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = match stderr.trim() {
                "" => format!("converter exited with {}", output.status),
                s => format!("converter exited with {}: {}", output.status, s),
            };
            return Err(failed(detail));
        }
        debug!(
            "soffice output: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );

        let pdf = expected_pdf_path(input, out_dir);
        if !tokio::fs::try_exists(&pdf).await.unwrap_or(false) {
            return Err(failed("converter produced no PDF".into()));
        }
        verify_pdf_magic(&pdf).await?;
        Ok(pdf)
    }

    fn name(&self) -> &'static str {
        "soffice"
    }
}

/// `soffice` names its output after the input stem.
pub fn expected_pdf_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    out_dir.join(format!("{stem}.pdf"))
}

/// Reject files that do not start with `%PDF`.
pub async fn verify_pdf_magic(path: &Path) -> Result<(), RelayError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| RelayError::io(path, e))?;
    let mut magic = [0u8; 4];
    let mut read = 0;
    while read < magic.len() {
        let n = file
            .read(&mut magic[read..])
            .await
            .map_err(|e| RelayError::io(path, e))?;
        if n == 0 {
            break;
        }
        read += n;
    }
    if &magic != b"%PDF" {
        return Err(RelayError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}
