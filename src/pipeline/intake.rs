//! Intake: validate an uploaded presentation and stage it on disk.
//!
//! The office suite needs a file-system path, so every upload is written into
//! its own `TempDir`. The directory (input file and converted PDF alike) is
//! removed when the [`StagedUpload`] is dropped, even on an error path.

use crate::config::extensions_display;
use crate::error::RelayError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

/// Random identifier naming every object produced by one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for UploadId {
    type Err = RelayError;

    /// Only the canonical hyphenated lower-case form is accepted, so that a
    /// parsed id always formats back to the exact storage prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RelayError::InvalidKey {
            key: s.to_string(),
            reason: "not an upload id".into(),
        };
        let uuid = Uuid::parse_str(s).map_err(|_| invalid())?;
        if uuid.hyphenated().to_string() != s {
            return Err(invalid());
        }
        Ok(Self(uuid))
    }
}

/// An upload written to its own staging directory.
pub struct StagedUpload {
    id: UploadId,
    filename: String,
    path: PathBuf,
    dir: TempDir,
}

impl StagedUpload {
    pub fn id(&self) -> UploadId {
        self.id
    }

    /// Sanitised original filename.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Path of the saved presentation (`{id}_{filename}`).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Staging directory; conversion output goes here too.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl fmt::Debug for StagedUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedUpload")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("path", &self.path)
            .finish()
    }
}

/// Lower-cased extension of `name`, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Check the client-supplied filename against the extension allow-list.
pub fn validate_filename(name: &str, allowed_extensions: &[String]) -> Result<(), RelayError> {
    if name.trim().is_empty() {
        return Err(RelayError::NoSelectedFile);
    }
    let ok = extension_of(name)
        .map(|ext| allowed_extensions.iter().any(|a| a == &ext))
        .unwrap_or(false);
    if !ok {
        return Err(RelayError::InvalidFileType {
            filename: name.to_string(),
            allowed: extensions_display(allowed_extensions),
        });
    }
    Ok(())
}

/// Reduce a client filename to one safe path component.
///
/// Directory parts (either separator) are dropped; anything outside
/// `[A-Za-z0-9._-]` becomes `_`. Leading dots are stripped so the result is
/// never hidden or `..`.
pub fn sanitise_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Check that `segment` is a single safe path component (used for URL path
/// parameters before they become storage keys).
pub fn validate_segment(segment: &str) -> Result<(), RelayError> {
    let reason = if segment.is_empty() {
        Some("empty")
    } else if segment == "." || segment == ".." {
        Some("relative path segment")
    } else if segment.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if segment.chars().any(char::is_control) {
        Some("contains control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(RelayError::InvalidKey {
            key: segment.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Write the upload into a fresh staging directory.
///
/// `work_dir` picks the parent directory; `None` uses the OS temp dir.
pub async fn stage_upload(
    bytes: &[u8],
    filename: &str,
    max_bytes: usize,
    work_dir: Option<&Path>,
) -> Result<StagedUpload, RelayError> {
    if bytes.is_empty() {
        return Err(RelayError::EmptyUpload {
            filename: filename.to_string(),
        });
    }
    if bytes.len() > max_bytes {
        return Err(RelayError::PayloadTooLarge { limit: max_bytes });
    }

    let id = UploadId::new();
    let filename = sanitise_filename(filename);

    let dir = match work_dir {
        Some(parent) => {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RelayError::io(parent, e))?;
            tempfile::Builder::new()
                .prefix("slide-relay-")
                .tempdir_in(parent)
                .map_err(|e| RelayError::io(parent, e))?
        }
        None => tempfile::Builder::new()
            .prefix("slide-relay-")
            .tempdir()
            .map_err(|e| RelayError::io(std::env::temp_dir(), e))?,
    };

    let path = dir.path().join(format!("{id}_{filename}"));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| RelayError::io(&path, e))?;

    debug!("Staged upload {} ({} bytes) at {}", id, bytes.len(), path.display());

    Ok(StagedUpload {
        id,
        filename,
        path,
        dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pptx() -> Vec<String> {
        vec!["pptx".to_string()]
    }

    #[test]
    fn empty_filename_is_no_selected_file() {
        assert!(matches!(
            validate_filename("", &pptx()),
            Err(RelayError::NoSelectedFile)
        ));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(validate_filename("Deck.PPTX", &pptx()).is_ok());
        assert!(validate_filename("deck.pptx", &pptx()).is_ok());
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let err = validate_filename("notes.txt", &pptx()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid file type. Only .pptx allowed");
        assert!(validate_filename("pptx", &pptx()).is_err());
        assert!(validate_filename(".pptx", &pptx()).is_err());
    }

    #[test]
    fn sanitise_strips_directories_and_odd_chars() {
        assert_eq!(sanitise_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitise_filename("C:\\Users\\me\\My Deck.pptx"), "My_Deck.pptx");
        assert_eq!(sanitise_filename("..pptx"), "pptx");
        assert_eq!(sanitise_filename("/"), "upload");
    }

    #[test]
    fn segments_are_validated() {
        assert!(validate_segment("slide_a_1.jpg").is_ok());
        assert!(validate_segment("..").is_err());
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment("").is_err());
    }

    #[test]
    fn upload_id_round_trips_only_canonical_form() {
        let id = UploadId::new();
        let parsed: UploadId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!(id.to_string().to_uppercase().parse::<UploadId>().is_err());
        assert!("not-a-uuid".parse::<UploadId>().is_err());
    }

    #[tokio::test]
    async fn stage_writes_prefixed_file_and_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let staged = stage_upload(b"PK\x03\x04", "My Deck.pptx", 1024, Some(work.path()))
            .await
            .unwrap();

        let expected = format!("{}_My_Deck.pptx", staged.id());
        assert_eq!(staged.path().file_name().unwrap().to_str().unwrap(), expected);
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"PK\x03\x04");

        let dir = staged.dir().to_path_buf();
        drop(staged);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn empty_and_oversized_uploads_are_rejected() {
        assert!(matches!(
            stage_upload(b"", "a.pptx", 10, None).await,
            Err(RelayError::EmptyUpload { .. })
        ));
        assert!(matches!(
            stage_upload(&[0u8; 11], "a.pptx", 10, None).await,
            Err(RelayError::PayloadTooLarge { limit: 10 })
        ));
    }
}
