//! In-process derivative cache.
//!
//! Resolving a derivative costs at least a handful of `stat` calls and, on a
//! miss, a full decode/resize/encode. The engine keeps the outcome of each
//! `(attachment, size, crop)` request here so repeated requests in the same
//! process skip the filesystem entirely.
//!
//! # Design
//!
//! - Backed by `moka::sync::Cache` with a time-to-live and a capacity bound.
//!   The filesystem stays the source of truth; the cache only has to be
//!   eventually consistent with it.
//! - Only successful resolutions are stored. An unknown size or a failed
//!   generation is recomputed on the next request.
//! - Concurrent misses for the same key are coalesced by
//!   `optionally_get_with`: one caller resolves, the others wait for it.
//! - Deleting an attachment's derivatives invalidates all of its keys via an
//!   invalidation predicate.
//! - A TTL of zero disables the cache; every call resolves.

use crate::derivatives::ImageDerivative;
use moka::sync::Cache;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// `(attachment_id, size-as-string, crop-as-string)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub attachment_id: u64,
    pub size: String,
    pub crop: String,
}

impl CacheKey {
    pub fn new(attachment_id: u64, size: impl fmt::Display, crop: Option<impl fmt::Display>) -> Self {
        Self {
            attachment_id,
            size: size.to_string(),
            crop: crop.map(|c| c.to_string()).unwrap_or_default(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.attachment_id, self.size, self.crop)
    }
}

pub struct DerivativeCache {
    inner: Option<Cache<CacheKey, ImageDerivative>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DerivativeCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build()
        });
        Self {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Return the cached value for `key`, or run `resolve` and cache a `Some`.
    pub fn get_or_resolve(
        &self,
        key: &CacheKey,
        resolve: impl FnOnce() -> Option<ImageDerivative>,
    ) -> Option<ImageDerivative> {
        let Some(cache) = &self.inner else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return resolve();
        };
        if let Some(hit) = cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "derivative cache hit");
            return Some(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "derivative cache miss");
        cache.optionally_get_with(key.clone(), resolve)
    }

    pub fn get(&self, key: &CacheKey) -> Option<ImageDerivative> {
        self.inner.as_ref().and_then(|cache| cache.get(key))
    }

    /// Drop every entry belonging to one attachment.
    pub fn invalidate_attachment(&self, attachment_id: u64) {
        if let Some(cache) = &self.inner {
            // Only fails when closures are unsupported, which `new` always enables.
            if let Err(e) =
                cache.invalidate_entries_if(move |key, _| key.attachment_id == attachment_id)
            {
                debug!(attachment_id, error = %e, "predicate invalidation failed, clearing cache");
                cache.invalidate_all();
            }
        }
    }

    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Summary of cache performance for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} resolved ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} resolved", self.misses)
        }
    }
}
