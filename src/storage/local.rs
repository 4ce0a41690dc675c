use super::{join_url, validate_key, ObjectStore};
use crate::error::RelayError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Objects as files under `root`, served by this service at `/files/{key}`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStore {
    /// Create the store, making `root` if it does not exist yet.
    pub async fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Result<Self, RelayError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| RelayError::io(&root, e))?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, RelayError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, RelayError> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| RelayError::io(&parent, e))?;

        // Readers never see a half-written file.
        let tmp = parent.join(format!(".{}.{}.tmp", uuid::Uuid::new_v4(), bytes.len()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| RelayError::io(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(RelayError::io(&path, e));
        }

        debug!("Stored {} ({} bytes) at {}", key, bytes.len(), path.display());
        Ok(self.public_url(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, RelayError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RelayError::io(&path, e)),
        }
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, &["files"], key)
    }

    fn name(&self) -> &'static str {
        "local"
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
