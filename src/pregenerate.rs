//! Background pre-generation of derivatives.
//!
//! The request path generates on first use, which makes the first page load
//! after an upload slow. `pregenerate` warms every `(attachment, size)` pair
//! up front, in parallel on the rayon pool, through the same
//! [`MediaEngine::ensure`] the request path uses. Single-flight locking in
//! the engine keeps a concurrent request and a pregeneration worker from
//! encoding the same file twice.

use crate::attachments::AttachmentStore;
use crate::derivatives::{Ensured, MediaEngine};
use crate::imaging::ImageBackend;
use crate::sizes::{SizeRegistry, SizeSpec};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Existing,
    Generated,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PregenerateItem {
    pub attachment_id: u64,
    pub size: String,
    pub status: ItemStatus,
    /// Number of formats on disk afterwards.
    pub formats: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PregenerateStats {
    pub existing: usize,
    pub generated: usize,
    pub unavailable: usize,
}

impl PregenerateStats {
    pub fn total(&self) -> usize {
        self.existing + self.generated + self.unavailable
    }

    fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Existing => self.existing += 1,
            ItemStatus::Generated => self.generated += 1,
            ItemStatus::Unavailable => self.unavailable += 1,
        }
    }
}

impl fmt::Display for PregenerateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} existing, {} generated",
            self.existing, self.generated
        )?;
        if self.unavailable > 0 {
            write!(f, ", {} unavailable", self.unavailable)?;
        }
        write!(f, " ({} total)", self.total())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PregenerateReport {
    /// One entry per `(attachment, size)`, in input order.
    pub items: Vec<PregenerateItem>,
    pub stats: PregenerateStats,
}

/// Every preset name in `registry` as a size specifier.
pub fn registered_sizes(registry: &SizeRegistry) -> Vec<SizeSpec> {
    registry
        .iter()
        .map(|preset| SizeSpec::named(preset.name.clone()))
        .collect()
}

/// Ensure derivatives exist for every attachment in `ids` at every size.
pub fn pregenerate<B: ImageBackend, S: AttachmentStore>(
    engine: &MediaEngine<B, S>,
    ids: &[u64],
    sizes: &[SizeSpec],
) -> PregenerateReport {
    let jobs: Vec<(u64, &SizeSpec)> = ids
        .iter()
        .flat_map(|&id| sizes.iter().map(move |size| (id, size)))
        .collect();
    debug!(jobs = jobs.len(), "pregenerating derivatives");

    let items: Vec<PregenerateItem> = jobs
        .par_iter()
        .map(|&(attachment_id, size)| {
            let (status, formats) = match engine.ensure(attachment_id, size, None) {
                Ensured::Existing(formats) => (ItemStatus::Existing, formats.len()),
                Ensured::Generated(formats) => (ItemStatus::Generated, formats.len()),
                Ensured::Unavailable => (ItemStatus::Unavailable, 0),
            };
            PregenerateItem {
                attachment_id,
                size: size.to_string(),
                status,
                formats,
            }
        })
        .collect();

    let mut stats = PregenerateStats::default();
    for item in &items {
        stats.record(item.status);
    }
    PregenerateReport { items, stats }
}
