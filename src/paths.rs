//! Content-addressed derivative paths and URLs.
//!
//! A derivative's location is a pure function of the source and the target
//! geometry:
//!
//! ```text
//! {upload_dir}/{derivative_dir}/{attachment_id}/{year}/{month}/{stem}-{w}x{h}{crop}.{ext}
//! uploads/skin-sizes/42/2024/05/photo-600x400-c.webp
//! ```
//!
//! The filename is the on-disk cache key: if it exists, the derivative exists.
//! No index is kept anywhere else. Each format is a sibling file differing
//! only in extension; `original` keeps the source's own extension.

use crate::attachments::ImageSource;
use crate::config::PathsConfig;
use crate::formats::{Format, extension_for};
use crate::imaging::Capabilities;
use crate::sizes::ResizeSpec;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// One candidate output for one format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatDescriptor {
    pub format: Format,
    pub path: PathBuf,
    pub url: String,
}

/// Candidate outputs for one `(source, spec)`, keyed by format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatPaths {
    entries: BTreeMap<Format, FormatDescriptor>,
}

impl FormatPaths {
    pub fn get(&self, format: Format) -> Option<&FormatDescriptor> {
        self.entries.get(&format)
    }

    /// Descriptors in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.entries.values()
    }

    pub fn formats(&self) -> impl Iterator<Item = Format> + '_ {
        self.entries.keys().copied()
    }

    /// The `original` entry; its path doubles as the single-flight key.
    pub fn base(&self) -> Option<&FormatDescriptor> {
        self.get(Format::Original)
    }
}

/// Maps sources and specs onto the derivative tree and back to URLs.
#[derive(Debug, Clone)]
pub struct PathResolver {
    upload_dir: PathBuf,
    upload_url: String,
    derivative_root: PathBuf,
}

impl PathResolver {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        upload_url: &str,
        derivative_dir: impl AsRef<Path>,
    ) -> Self {
        let upload_dir = upload_dir.into();
        let derivative_root = upload_dir.join(derivative_dir);
        Self {
            upload_dir,
            upload_url: upload_url.trim_end_matches('/').to_string(),
            derivative_root,
        }
    }

    pub fn from_config(config: &PathsConfig) -> Self {
        Self::new(
            &config.upload_dir,
            &config.upload_url,
            &config.derivative_dir,
        )
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn derivative_root(&self) -> &Path {
        &self.derivative_root
    }

    /// Directory holding every derivative of one attachment.
    pub fn attachment_dir(&self, attachment_id: u64) -> PathBuf {
        self.derivative_root.join(attachment_id.to_string())
    }

    /// `{stem}-{w}x{h}{crop}.{ext}`
    pub fn derivative_filename(stem: &str, ext: &str, spec: &ResizeSpec) -> String {
        format!("{stem}-{spec}.{ext}")
    }

    /// Candidate paths for every format `capabilities` allows.
    ///
    /// PNG is included for lookup when allowed even though it is never
    /// generated, so PNG files left by earlier runs are still found.
    pub fn derivative_paths(
        &self,
        source: &ImageSource,
        spec: &ResizeSpec,
        capabilities: Capabilities,
    ) -> FormatPaths {
        let dir = self
            .attachment_dir(source.attachment_id)
            .join(source.relative_dir());
        let mut entries = BTreeMap::new();
        for format in [Format::Webp, Format::Jpeg, Format::Png, Format::Original] {
            if !capabilities.supports(format) {
                continue;
            }
            let ext = extension_for(format).unwrap_or(source.extension.as_str());
            let path = dir.join(Self::derivative_filename(source.stem(), ext, spec));
            let url = self.url_for(&path);
            entries.insert(format, FormatDescriptor { format, path, url });
        }
        FormatPaths { entries }
    }

    /// Public URL of the untouched source file.
    pub fn source_url(&self, source: &ImageSource) -> String {
        self.url_for(&source.file_path)
    }

    /// Public URL for a file inside the upload directory.
    ///
    /// Paths outside the upload directory are returned as-is.
    pub fn url_for(&self, path: &Path) -> String {
        match path.strip_prefix(&self.upload_dir) {
            Ok(relative) => {
                let segments: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect();
                format!("{}/{}", self.upload_url, segments.join("/"))
            }
            Err(_) => path.to_string_lossy().to_string(),
        }
    }

    /// Filesystem path for a public upload URL.
    ///
    /// Accepts a bare path (`/wp-content/uploads/...`) or an absolute URL
    /// containing it. Returns `None` for URLs outside the upload prefix and
    /// for anything that would escape the upload directory.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let url = url.split(['?', '#']).next().unwrap_or("");
        let start = url.find(&self.upload_url)?;
        let rest = url[start + self.upload_url.len()..].strip_prefix('/')?;
        if rest.is_empty() {
            return None;
        }
        let relative = Path::new(rest);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.upload_dir.join(relative))
    }
}
