//! Attachment records: where each source image lives and how big it is.
//!
//! The engine only needs a lookup from attachment id to [`ImageSource`], so
//! the store sits behind the [`AttachmentStore`] trait. The bundled
//! [`ManifestStore`] reads `attachments.json` from the upload directory:
//!
//! ```json
//! {
//!   "attachments": [
//!     { "id": 42, "file": "2024/05/photo.jpg", "width": 4000, "height": 3000 }
//!   ]
//! }
//! ```
//!
//! `file` is relative to the upload directory. `width`/`height` may be
//! omitted; the engine then reads them from the file when it needs them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate attachment id {0} in manifest")]
    DuplicateId(u64),
}

/// A source image as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub attachment_id: u64,
    /// Absolute (or upload-dir-joined) path of the original upload.
    pub file_path: PathBuf,
    /// Path relative to the upload directory, e.g. `2024/05/photo.jpg`.
    pub relative_path: PathBuf,
    pub original_width: Option<u32>,
    pub original_height: Option<u32>,
    /// Lowercased extension of the source file.
    pub extension: String,
}

impl ImageSource {
    pub fn new(
        attachment_id: u64,
        upload_dir: &Path,
        relative_path: impl Into<PathBuf>,
        original_width: Option<u32>,
        original_height: Option<u32>,
    ) -> Self {
        let relative_path = relative_path.into();
        let extension = relative_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        Self {
            attachment_id,
            file_path: upload_dir.join(&relative_path),
            relative_path,
            original_width,
            original_height,
            extension,
        }
    }

    /// File name without extension, used as the derivative name stem.
    pub fn stem(&self) -> &str {
        self.relative_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }

    /// Vector sources are passed through untouched, never rasterized.
    pub fn is_vector(&self) -> bool {
        self.extension == "svg"
    }

    /// Directory of the source relative to the upload dir (`2024/05`).
    pub fn relative_dir(&self) -> &Path {
        self.relative_path.parent().unwrap_or(Path::new(""))
    }
}

/// Attachment lookup used by the engine.
pub trait AttachmentStore: Send + Sync {
    fn source(&self, attachment_id: u64) -> Option<ImageSource>;

    /// All known attachment ids, ascending.
    fn ids(&self) -> Vec<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: u64,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachmentManifest {
    #[serde(default)]
    pub attachments: Vec<AttachmentRecord>,
}

/// [`AttachmentStore`] backed by an in-memory copy of `attachments.json`.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    upload_dir: PathBuf,
    records: BTreeMap<u64, AttachmentRecord>,
}

impl ManifestStore {
    /// Read the manifest at `manifest_path`.
    ///
    /// A missing manifest yields an empty store; a malformed one is an error.
    pub fn load(upload_dir: &Path, manifest_path: &Path) -> Result<Self, StoreError> {
        if !manifest_path.exists() {
            debug!(path = %manifest_path.display(), "no attachment manifest");
            return Self::from_records(upload_dir, Vec::new());
        }
        let content = fs::read_to_string(manifest_path)?;
        let manifest: AttachmentManifest = serde_json::from_str(&content)?;
        debug!(
            path = %manifest_path.display(),
            count = manifest.attachments.len(),
            "loaded attachment manifest"
        );
        Self::from_records(upload_dir, manifest.attachments)
    }

    pub fn from_records(
        upload_dir: &Path,
        records: Vec<AttachmentRecord>,
    ) -> Result<Self, StoreError> {
        let mut by_id = BTreeMap::new();
        for record in records {
            let id = record.id;
            if by_id.insert(id, record).is_some() {
                return Err(StoreError::DuplicateId(id));
            }
        }
        Ok(Self {
            upload_dir: upload_dir.to_path_buf(),
            records: by_id,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AttachmentStore for ManifestStore {
    fn source(&self, attachment_id: u64) -> Option<ImageSource> {
        self.records.get(&attachment_id).map(|record| {
            ImageSource::new(
                record.id,
                &self.upload_dir,
                &record.file,
                record.width,
                record.height,
            )
        })
    }

    fn ids(&self) -> Vec<u64> {
        self.records.keys().copied().collect()
    }
}
