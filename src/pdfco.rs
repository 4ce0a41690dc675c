//! PDF.co web API client and the remote [`SlideRasteriser`] built on it.
//!
//! Rasterising through PDF.co takes three round trips:
//!
//! ```text
//! GET  /file/upload/get-presigned-url  → { presignedUrl, url }
//! PUT  <presignedUrl>                  ← PDF bytes
//! POST /pdf/convert/to/jpg {url}       → { urls: [...] }
//! ```
//!
//! followed by one download per returned image URL. PDF.co reports most
//! failures as HTTP 200 with `"error": true`, so both the status and the body
//! flag are checked.

use crate::config::PdfCoSettings;
use crate::error::{RelayError, SlideError};
use crate::pipeline::render::{RasterOutput, RenderedSlide, SlideRasteriser};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SERVICE: &str = "PDF.co";

/// Response of `GET /file/upload/get-presigned-url`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    /// Where to PUT the bytes.
    pub presigned_url: String,
    /// How later API calls refer to the uploaded file.
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresignedResponse {
    #[serde(default)]
    error: bool,
    message: Option<String>,
    presigned_url: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    #[serde(default)]
    error: bool,
    message: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
}

/// Thin typed wrapper over the PDF.co endpoints this service uses.
#[derive(Debug, Clone)]
pub struct PdfCoClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl PdfCoClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &PdfCoSettings, timeout: Duration) -> Result<Self, RelayError> {
        Self::new(&settings.api_key, &settings.base_url, timeout)
    }

    /// Ask PDF.co for a presigned upload slot named `name`.
    pub async fn presigned_upload(&self, name: &str) -> Result<PresignedUpload, RelayError> {
        let response = self
            .http
            .get(format!("{}/file/upload/get-presigned-url", self.base_url))
            .query(&[("contenttype", "application/octet-stream"), ("name", name)])
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(remote)?;
        let body: PresignedResponse = json_body(response).await?;
        if body.error {
            return Err(api_error(body.message));
        }
        match (body.presigned_url, body.url) {
            (Some(presigned_url), Some(url)) => Ok(PresignedUpload { presigned_url, url }),
            _ => Err(api_error(Some("presigned URL missing from response".into()))),
        }
    }

    /// Upload `bytes` as `name`; returns the URL PDF.co knows the file by.
    pub async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String, RelayError> {
        let slot = self.presigned_upload(name).await?;
        let response = self
            .http
            .put(&slot.presigned_url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(remote)?;
        if !response.status().is_success() {
            return Err(api_error(Some(format!(
                "file upload returned HTTP {}",
                response.status()
            ))));
        }
        debug!("Uploaded '{}' to PDF.co", name);
        Ok(slot.url)
    }

    /// Convert an uploaded PDF to images of `image_type` (`jpg`, `png`, …).
    ///
    /// `pages` uses PDF.co's syntax (`0,2-5,7-`); empty means all pages.
    pub async fn convert_pdf_to_images(
        &self,
        file_url: &str,
        image_type: &str,
        pages: &str,
        password: &str,
    ) -> Result<Vec<String>, RelayError> {
        let response = self
            .http
            .post(format!("{}/pdf/convert/to/{}", self.base_url, image_type))
            .header("x-api-key", &self.api_key)
            .form(&[("url", file_url), ("pages", pages), ("password", password)])
            .send()
            .await
            .map_err(remote)?;
        let body: ConvertResponse = json_body(response).await?;
        if body.error {
            return Err(api_error(body.message));
        }
        Ok(body.urls)
    }

    /// Fetch a result file.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, RelayError> {
        let response = self.http.get(url).send().await.map_err(remote)?;
        if !response.status().is_success() {
            return Err(api_error(Some(format!(
                "download of {} returned HTTP {}",
                url,
                response.status()
            ))));
        }
        let bytes = response.bytes().await.map_err(remote)?;
        Ok(bytes.to_vec())
    }
}

fn remote(e: reqwest::Error) -> RelayError {
    let message = if e.is_timeout() {
        format!("request timed out: {}", e)
    } else {
        e.to_string()
    };
    RelayError::RemoteApi {
        service: SERVICE.to_string(),
        message,
    }
}

fn api_error(message: Option<String>) -> RelayError {
    RelayError::RemoteApi {
        service: SERVICE.to_string(),
        message: message.unwrap_or_else(|| "unknown error".to_string()),
    }
}

async fn json_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RelayError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(api_error(Some(format!(
            "HTTP {}: {}",
            status,
            text.trim()
        ))));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| api_error(Some(format!("unreadable response: {}", e))))
}

/// Remote rasteriser: PDF.co renders, this service downloads the images.
#[derive(Debug, Clone)]
pub struct PdfCoRasteriser {
    client: PdfCoClient,
    pages: String,
    password: String,
    download_concurrency: usize,
}

impl PdfCoRasteriser {
    pub fn new(client: PdfCoClient, pages: impl Into<String>, download_concurrency: usize) -> Self {
        Self {
            client,
            pages: pages.into(),
            password: String::new(),
            download_concurrency: download_concurrency.max(1),
        }
    }

    /// Password for protected PDFs.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Client, page selection and password all taken from `settings`.
    pub fn from_settings(
        settings: &PdfCoSettings,
        timeout: Duration,
        download_concurrency: usize,
    ) -> Result<Self, RelayError> {
        let client = PdfCoClient::from_settings(settings, timeout)?;
        Ok(Self::new(client, settings.pages.clone(), download_concurrency)
            .with_password(settings.password.clone()))
    }
}

#[async_trait]
impl SlideRasteriser for PdfCoRasteriser {
    async fn rasterise(&self, pdf: &Path) -> Result<RasterOutput, RelayError> {
        let start = Instant::now();
        let bytes = tokio::fs::read(pdf)
            .await
            .map_err(|e| RelayError::io(pdf, e))?;
        let name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let file_url = self.client.upload(bytes, &name).await?;
        let urls = self
            .client
            .convert_pdf_to_images(&file_url, "jpg", &self.pages, &self.password)
            .await?;
        info!("PDF.co produced {} slide images", urls.len());

        let results: Vec<(usize, Result<Vec<u8>, RelayError>)> =
            stream::iter(urls.into_iter().enumerate())
                .map(|(idx, url)| async move { (idx + 1, self.client.download(&url).await) })
                .buffered(self.download_concurrency)
                .collect()
                .await;

        let mut output = RasterOutput::default();
        for (number, result) in results {
            match result {
                Ok(bytes) => output.slides.push(RenderedSlide {
                    number,
                    bytes,
                    content_type: "image/jpeg".to_string(),
                }),
                Err(e) => {
                    warn!("Slide {}: {}", number, e);
                    output.errors.push(SlideError::DownloadFailed {
                        slide: number,
                        detail: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Fetched {}/{} slides from PDF.co in {:?}",
            output.slides.len(),
            output.total(),
            start.elapsed()
        );
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "pdfco"
    }
}
