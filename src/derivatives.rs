//! Derivative resolution and generation.
//!
//! [`MediaEngine`] answers "give me attachment N at size S" and is the only
//! place that touches the derivative tree. A request flows through:
//!
//! ```text
//! get_src(id, size, crop)
//!   ├─ "full"            → the source file itself
//!   ├─ cache hit         → cached ImageDerivative
//!   └─ cache miss
//!        ├─ SVG / undecodable source → the source file itself
//!        ├─ resolve size (theme presets, then native sizes)
//!        ├─ FormatPaths for (source, spec)
//!        ├─ first file on disk in webp → jpeg → png → original order
//!        └─ none: lock key, re-check disk, generate original + webp + jpeg,
//!           then pick again in priority order
//! ```
//!
//! Nothing on the request path returns an error. Failures are logged with
//! `tracing` and surface as `None` (or an empty map) so a page render never
//! fails because one image could not be produced. A failed generation is not
//! cached; the next request tries again.
//!
//! ## Concurrency
//!
//! Filenames are content addressed, so two workers generating the same key
//! would write identical files. With `cache.single_flight` enabled (the
//! default) a per-path mutex in a `DashMap` makes the second worker wait and
//! then find the first worker's files on disk instead of re-encoding.
//! Formats are written one after another, so a lookup that finds only part
//! of the generated set takes the same lock before answering; it never
//! returns (or caches) the JPEG of a set whose WebP is still being written.
//! Cache-level misses for the same key are coalesced by the cache itself.

use crate::attachments::{AttachmentStore, ImageSource};
use crate::cache::{CacheKey, CacheStats, DerivativeCache};
use crate::config::MediaConfig;
use crate::formats::{Format, FormatRequest, GENERATION_ORDER, mime_for_extension, negotiate};
use crate::imaging::calculations::{self, GeometryError};
use crate::imaging::{BackendError, Capabilities, ImageBackend, QualitySettings};
use crate::paths::{FormatPaths, PathResolver};
use crate::sizes::{Crop, ResizeSpec, SizeRegistry, SizeSpec, resolve_spec};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A resolved image: public URL, actual pixel size, and encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDerivative {
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub format: Format,
}

impl ImageDerivative {
    pub fn mime_type(&self) -> &'static str {
        self.src
            .rsplit_once('.')
            .and_then(|(_, ext)| mime_for_extension(ext))
            .unwrap_or("application/octet-stream")
    }
}

/// Notifications for code that reacts to derivative changes (CDN pushes,
/// progress output).
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    DerivativeCreated {
        attachment_id: u64,
        size: ResizeSpec,
        derivatives: BTreeMap<Format, ImageDerivative>,
    },
    DerivativesPurged {
        attachment_id: u64,
    },
}

#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unknown attachment {0}")]
    UnknownAttachment(u64),
    #[error("attachment {attachment_id}: .{extension} sources are served as-is")]
    UnsupportedSourceFormat { attachment_id: u64, extension: String },
    #[error("attachment {attachment_id}: {path}: {source}")]
    BackendFailure {
        attachment_id: u64,
        path: PathBuf,
        source: BackendError,
    },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Outcome of [`MediaEngine::ensure`].
#[derive(Debug, Clone, PartialEq)]
pub enum Ensured {
    /// Every listed format was already on disk.
    Existing(BTreeMap<Format, ImageDerivative>),
    /// This call generated the derivatives.
    Generated(BTreeMap<Format, ImageDerivative>),
    Unavailable,
}

impl Ensured {
    pub fn into_formats(self) -> BTreeMap<Format, ImageDerivative> {
        match self {
            Ensured::Existing(formats) | Ensured::Generated(formats) => formats,
            Ensured::Unavailable => BTreeMap::new(),
        }
    }
}

/// A request that passed validation and maps onto concrete paths.
struct Prepared {
    source: ImageSource,
    spec: ResizeSpec,
    paths: FormatPaths,
}

enum Generation {
    Created,
    FoundAfterLock,
    Failed,
}

pub struct MediaEngine<B: ImageBackend, S: AttachmentStore> {
    backend: B,
    store: S,
    sizes: SizeRegistry,
    native_sizes: SizeRegistry,
    paths: PathResolver,
    capabilities: Capabilities,
    quality: QualitySettings,
    cache: DerivativeCache,
    locks: Option<DashMap<PathBuf, Arc<Mutex<()>>>>,
    events: Option<Sender<MediaEvent>>,
}

impl<B: ImageBackend, S: AttachmentStore> MediaEngine<B, S> {
    pub fn new(backend: B, store: S, config: &MediaConfig) -> Self {
        let capabilities = backend
            .capabilities()
            .intersect(config.formats.capabilities());
        debug!(
            webp = capabilities.webp,
            jpeg = capabilities.jpeg,
            png = capabilities.png,
            "derivative formats"
        );
        Self {
            backend,
            store,
            sizes: SizeRegistry::from_config(&config.sizes),
            native_sizes: SizeRegistry::from_config(&config.native_sizes),
            paths: PathResolver::from_config(&config.paths),
            capabilities,
            quality: QualitySettings::from_config(&config.quality),
            cache: DerivativeCache::new(
                Duration::from_secs(config.cache.ttl_secs),
                config.cache.max_entries,
            ),
            locks: config.cache.single_flight.then(DashMap::new),
            events: None,
        }
    }

    /// Send [`MediaEvent`]s to `events`. A dropped receiver is ignored.
    pub fn with_events(mut self, events: Sender<MediaEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sizes(&self) -> &SizeRegistry {
        &self.sizes
    }

    pub fn native_sizes(&self) -> &SizeRegistry {
        &self.native_sizes
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Target geometry for a size, with theme presets taking precedence.
    pub fn resolve_size(&self, size: &SizeSpec, crop: Option<Crop>) -> Option<ResizeSpec> {
        resolve_spec(&self.sizes, &self.native_sizes, size, crop)
    }

    // =========================================================================
    // Request path
    // =========================================================================

    /// Best available derivative of an attachment at `size`.
    ///
    /// Generates the derivative on first use. Returns `None` for unknown
    /// attachments and sizes and when generation fails.
    pub fn get_src(
        &self,
        attachment_id: u64,
        size: &SizeSpec,
        crop: Option<Crop>,
    ) -> Option<ImageDerivative> {
        if size.is_full() {
            return self.full_size(attachment_id);
        }
        if attachment_id == 0 || size.is_empty() {
            debug!(attachment_id, size = %size, "rejected derivative request");
            return None;
        }
        let key = CacheKey::new(attachment_id, size, crop);
        self.cache
            .get_or_resolve(&key, || self.resolve_best(attachment_id, size, crop))
    }

    /// Derivative in a specific format, falling back along the format's chain.
    pub fn get_src_format(
        &self,
        attachment_id: u64,
        size: &SizeSpec,
        format: FormatRequest,
        crop: Option<Crop>,
    ) -> Option<ImageDerivative> {
        let requested = match format {
            FormatRequest::Best => return self.get_src(attachment_id, size, crop),
            FormatRequest::Exact(format) => format,
        };
        let mut formats = self.get_all_formats(attachment_id, size, crop);
        let available: BTreeSet<Format> = formats.keys().copied().collect();
        let chosen = negotiate(requested, &available)?;
        formats.remove(&chosen)
    }

    /// Every available format for a size, generating them if none exist.
    pub fn get_all_formats(
        &self,
        attachment_id: u64,
        size: &SizeSpec,
        crop: Option<Crop>,
    ) -> BTreeMap<Format, ImageDerivative> {
        self.ensure(attachment_id, size, crop).into_formats()
    }

    /// Make sure derivatives for `(attachment_id, size, crop)` exist on disk.
    pub fn ensure(&self, attachment_id: u64, size: &SizeSpec, crop: Option<Crop>) -> Ensured {
        if size.is_full() {
            return self.full_size_formats(attachment_id);
        }
        let prepared = match self.prepare(attachment_id, size, crop) {
            Ok(prepared) => prepared,
            Err(DeriveError::UnsupportedSourceFormat { .. }) => {
                return self.full_size_formats(attachment_id);
            }
            Err(e) => {
                debug!(attachment_id, size = %size, error = %e, "no derivative");
                return Ensured::Unavailable;
            }
        };

        let existing = self.existing_formats(&prepared);
        if !existing.is_empty() && self.settled(&prepared) {
            return Ensured::Existing(existing);
        }
        match self.generate_once(&prepared) {
            Generation::Failed => Ensured::Unavailable,
            outcome => {
                let formats = self.existing_formats(&prepared);
                if formats.is_empty() {
                    Ensured::Unavailable
                } else if matches!(outcome, Generation::Created) {
                    Ensured::Generated(formats)
                } else {
                    Ensured::Existing(formats)
                }
            }
        }
    }

    /// Generate every format of `spec` for `source`, bypassing disk checks.
    ///
    /// Returns the **last** format successfully written in generation order
    /// (original → webp → jpeg), not the best one. Callers that want the best
    /// format should go through [`get_src`](Self::get_src), which re-reads
    /// the disk in priority order after generating.
    pub fn generate(&self, source: &ImageSource, spec: &ResizeSpec) -> Option<ImageDerivative> {
        let paths = self.paths.derivative_paths(source, spec, self.capabilities);
        match self.write_derivatives(source, spec, &paths) {
            Ok(last) => last,
            Err(e) => {
                self.log_failure(source, &paths, &e);
                None
            }
        }
    }

    fn resolve_best(
        &self,
        attachment_id: u64,
        size: &SizeSpec,
        crop: Option<Crop>,
    ) -> Option<ImageDerivative> {
        let prepared = match self.prepare(attachment_id, size, crop) {
            Ok(prepared) => prepared,
            Err(DeriveError::UnsupportedSourceFormat { .. }) => {
                return self.full_size(attachment_id);
            }
            Err(e) => {
                debug!(attachment_id, size = %size, error = %e, "no derivative");
                return None;
            }
        };
        if let Some(found) = self.find_best_existing(&prepared)
            && self.settled(&prepared)
        {
            return Some(found);
        }
        match self.generate_once(&prepared) {
            Generation::Failed => None,
            _ => self.find_best_existing(&prepared),
        }
    }

    fn prepare(
        &self,
        attachment_id: u64,
        size: &SizeSpec,
        crop: Option<Crop>,
    ) -> Result<Prepared, DeriveError> {
        if attachment_id == 0 {
            return Err(DeriveError::InvalidRequest(
                "attachment id must be positive".into(),
            ));
        }
        if size.is_empty() {
            return Err(DeriveError::InvalidRequest("empty size".into()));
        }
        let source = self
            .store
            .source(attachment_id)
            .ok_or(DeriveError::UnknownAttachment(attachment_id))?;
        if source.is_vector()
            || !self
                .backend
                .supported_extensions()
                .contains(&source.extension.as_str())
        {
            return Err(DeriveError::UnsupportedSourceFormat {
                attachment_id,
                extension: source.extension.clone(),
            });
        }
        let spec = self
            .resolve_size(size, crop)
            .ok_or_else(|| DeriveError::InvalidRequest(format!("unresolvable size {size}")))?;
        let paths = self
            .paths
            .derivative_paths(&source, &spec, self.capabilities);
        Ok(Prepared {
            source,
            spec,
            paths,
        })
    }

    // =========================================================================
    // Disk lookup
    // =========================================================================

    /// Read one candidate back from disk, using its real dimensions.
    fn read_existing(&self, format: Format, path: &Path, url: &str) -> Option<ImageDerivative> {
        if !path.is_file() {
            return None;
        }
        match self.backend.identify(path) {
            Ok(dims) => Some(ImageDerivative {
                src: url.to_string(),
                width: dims.width,
                height: dims.height,
                format,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable derivative on disk");
                None
            }
        }
    }

    fn find_best_existing(&self, prepared: &Prepared) -> Option<ImageDerivative> {
        let found = prepared
            .paths
            .iter()
            .find_map(|d| self.read_existing(d.format, &d.path, &d.url));
        if let Some(found) = &found {
            debug!(
                attachment_id = prepared.source.attachment_id,
                src = %found.src,
                "derivative found on disk"
            );
        }
        found
    }

    /// Whether what is on disk can be trusted without taking the lock: every
    /// generated format exists, or there is no lock to wait on.
    fn settled(&self, prepared: &Prepared) -> bool {
        self.locks.is_none()
            || GENERATION_ORDER
                .iter()
                .filter_map(|&format| prepared.paths.get(format))
                .all(|d| d.path.is_file())
    }

    fn existing_formats(&self, prepared: &Prepared) -> BTreeMap<Format, ImageDerivative> {
        prepared
            .paths
            .iter()
            .filter_map(|d| {
                self.read_existing(d.format, &d.path, &d.url)
                    .map(|found| (d.format, found))
            })
            .collect()
    }

    fn full_size(&self, attachment_id: u64) -> Option<ImageDerivative> {
        let source = self.store.source(attachment_id)?;
        let (width, height) = match (source.original_width, source.original_height) {
            (Some(w), Some(h)) => (w, h),
            _ if source.is_vector() => (0, 0),
            _ => match self.backend.identify(&source.file_path) {
                Ok(dims) => (dims.width, dims.height),
                Err(e) => {
                    debug!(attachment_id, error = %e, "source dimensions unavailable");
                    (0, 0)
                }
            },
        };
        Some(ImageDerivative {
            src: self.paths.source_url(&source),
            width,
            height,
            format: Format::Original,
        })
    }

    fn full_size_formats(&self, attachment_id: u64) -> Ensured {
        match self.full_size(attachment_id) {
            Some(full) => Ensured::Existing(BTreeMap::from([(Format::Original, full)])),
            None => Ensured::Unavailable,
        }
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// Generate under the per-path lock, unless another worker already did.
    fn generate_once(&self, prepared: &Prepared) -> Generation {
        let Some(locks) = &self.locks else {
            return self.generate_prepared(prepared);
        };
        let Some(base) = prepared.paths.base() else {
            return Generation::Failed;
        };
        let key = base.path.clone();
        let lock = locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            if self.find_best_existing(prepared).is_some() {
                debug!(path = %key.display(), "derivative generated by another worker");
                Generation::FoundAfterLock
            } else {
                self.generate_prepared(prepared)
            }
        };

        drop(lock);
        locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        outcome
    }

    fn generate_prepared(&self, prepared: &Prepared) -> Generation {
        match self.write_derivatives(&prepared.source, &prepared.spec, &prepared.paths) {
            Ok(_) => Generation::Created,
            Err(e) => {
                self.log_failure(&prepared.source, &prepared.paths, &e);
                Generation::Failed
            }
        }
    }

    fn log_failure(&self, source: &ImageSource, paths: &FormatPaths, error: &DeriveError) {
        let path = match error {
            DeriveError::BackendFailure { path, .. } => path.clone(),
            _ => paths
                .base()
                .map(|d| d.path.clone())
                .unwrap_or_else(|| source.file_path.clone()),
        };
        warn!(
            attachment_id = source.attachment_id,
            path = %path.display(),
            error = %error,
            "derivative generation failed"
        );
    }

    /// Decode once, resize once, save each generated format.
    ///
    /// A format that fails to save is logged and skipped; the call fails
    /// only when no format could be written.
    fn write_derivatives(
        &self,
        source: &ImageSource,
        spec: &ResizeSpec,
        paths: &FormatPaths,
    ) -> Result<Option<ImageDerivative>, DeriveError> {
        let attachment_id = source.attachment_id;
        let failure = |path: &Path, source: BackendError| DeriveError::BackendFailure {
            attachment_id,
            path: path.to_path_buf(),
            source,
        };

        let mut editor = self
            .backend
            .open(&source.file_path)
            .map_err(|e| failure(&source.file_path, e))?;
        let dims = editor.dimensions();
        let rect = calculations::resize(spec.crop, dims.width, dims.height, spec.width, spec.height)?
            .ok_or_else(|| {
                DeriveError::InvalidRequest(format!(
                    "{spec} from {}x{} rounds to an empty image",
                    dims.width, dims.height
                ))
            })?;
        editor
            .apply(&rect)
            .map_err(|e| failure(&source.file_path, e))?;

        let mut written: BTreeMap<Format, ImageDerivative> = BTreeMap::new();
        let mut saved: Vec<(PathBuf, u32, u32)> = Vec::new();
        let mut last = None;

        for format in GENERATION_ORDER {
            let Some(target) = paths.get(format) else {
                continue;
            };
            let dims = if let Some((_, w, h)) = saved.iter().find(|(p, _, _)| *p == target.path) {
                (*w, *h)
            } else {
                if let Some(dir) = target.path.parent() {
                    fs::create_dir_all(dir).map_err(|e| failure(dir, BackendError::Io(e)))?;
                }
                let quality = self.quality.for_path(&target.path);
                if let Err(e) = editor.save(&target.path, quality) {
                    warn!(
                        attachment_id,
                        path = %target.path.display(),
                        error = %e,
                        "failed to write derivative format"
                    );
                    continue;
                }
                match self.backend.identify(&target.path) {
                    Ok(actual) => {
                        saved.push((target.path.clone(), actual.width, actual.height));
                        (actual.width, actual.height)
                    }
                    Err(e) => {
                        warn!(
                            attachment_id,
                            path = %target.path.display(),
                            error = %e,
                            "written derivative is unreadable"
                        );
                        continue;
                    }
                }
            };
            let derivative = ImageDerivative {
                src: target.url.clone(),
                width: dims.0,
                height: dims.1,
                format,
            };
            written.insert(format, derivative.clone());
            last = Some(derivative);
        }

        if written.is_empty() {
            let base = paths
                .base()
                .map(|d| d.path.as_path())
                .unwrap_or(source.file_path.as_path());
            return Err(failure(
                base,
                BackendError::ProcessingFailed("no format could be written".into()),
            ));
        }

        info!(
            attachment_id,
            size = %spec,
            formats = written.len(),
            "created derivatives"
        );
        self.emit(MediaEvent::DerivativeCreated {
            attachment_id,
            size: *spec,
            derivatives: written,
        });
        Ok(last)
    }

    fn emit(&self, event: MediaEvent) {
        if let Some(events) = &self.events
            && events.send(event).is_err()
        {
            debug!("media event receiver dropped");
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Remove every derivative of one attachment. Succeeds if none exist.
    pub fn delete_attachment_derivatives(&self, attachment_id: u64) -> io::Result<()> {
        let dir = self.paths.attachment_dir(attachment_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(attachment_id, dir = %dir.display(), "purged derivatives"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.cache.invalidate_attachment(attachment_id);
        self.emit(MediaEvent::DerivativesPurged { attachment_id });
        Ok(())
    }

    /// Remove and recreate the whole derivative root.
    pub fn delete_all_derivatives(&self) -> io::Result<()> {
        let root = self.paths.derivative_root();
        match fs::remove_dir_all(root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(root)?;
        self.cache.invalidate_all();
        debug!(root = %root.display(), "purged all derivatives");
        Ok(())
    }

    /// Files currently in an attachment's derivative directory, sorted.
    pub fn list_derivatives(&self, attachment_id: u64) -> Vec<PathBuf> {
        let dir = self.paths.attachment_dir(attachment_id);
        if !dir.is_dir() {
            return Vec::new();
        }
        WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with(".skin-"))
            .map(|entry| entry.into_path())
            .collect()
    }
}
