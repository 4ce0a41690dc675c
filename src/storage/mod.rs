//! Object storage for converted PDFs, slide images and screenshots.
//!
//! Two backends implement [`ObjectStore`]:
//!
//! * [`LocalStore`] writes under a directory that the HTTP server serves back
//!   at `/files`; useful for development and single-host deployments.
//! * [`S3Store`] writes to an S3 (or S3-compatible) bucket and hands out the
//!   bucket's public object URLs.
//!
//! Keys are relative, `/`-separated paths (`{id}.pdf`, `{id}/slide_{id}_1.jpg`)
//! and are validated before they reach either backend.

mod local;
mod s3;

pub use local::LocalStore;
pub use s3::{s3_public_url, S3Store};

use crate::config::{ServiceConfig, StorageBackend};
use crate::error::RelayError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// A place to put objects and get URLs for them.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object. Returns the
    /// public URL of the stored object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, RelayError>;

    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, RelayError>;

    /// Public URL for `key`. Does not check existence.
    fn public_url(&self, key: &str) -> String;

    /// Short name for logs and `/healthz`.
    fn name(&self) -> &'static str;

    /// Directory to serve at `/files` when objects live on the local disk.
    fn local_root(&self) -> Option<&Path> {
        None
    }
}

/// Build the configured storage backend.
pub async fn build_store(config: &ServiceConfig) -> Result<Arc<dyn ObjectStore>, RelayError> {
    match &config.storage {
        StorageBackend::Local { root } => Ok(Arc::new(
            LocalStore::new(root, &config.public_base_url).await?,
        )),
        StorageBackend::S3 { .. } => Ok(Arc::new(S3Store::connect(&config.storage).await?)),
    }
}

/// Reject keys that could escape the storage root or address nothing.
pub fn validate_key(key: &str) -> Result<(), RelayError> {
    let invalid = |reason: &str| RelayError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(invalid("empty"));
    }
    if key.starts_with('/') {
        return Err(invalid("absolute path"));
    }
    if key.contains('\\') {
        return Err(invalid("contains a backslash"));
    }
    if key
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(invalid("empty or relative path segment"));
    }
    if key.chars().any(char::is_control) {
        return Err(invalid("contains control characters"));
    }
    Ok(())
}

/// Append `key` to `base` as percent-encoded path segments.
pub(crate) fn join_url(base: &str, prefix: &[&str], key: &str) -> String {
    match url::Url::parse(base) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments
                    .pop_if_empty()
                    .extend(prefix.iter().copied())
                    .extend(key.split('/'));
            }
            url.to_string()
        }
        _ => {
            let mut out = base.trim_end_matches('/').to_string();
            for seg in prefix.iter().copied().chain(key.split('/')) {
                out.push('/');
                out.push_str(seg);
            }
            out
        }
    }
}
