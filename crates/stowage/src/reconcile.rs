//! Catalog-to-storage reconciliation.
//!
//! A sweep compares the files under a storage root with the rows of its
//! catalog and corrects the catalog:
//! - files with no row get a synthesized row;
//! - rows with no file are deleted.
//!
//! Matching rows are never modified. A sweep holds no state between runs, so
//! an interrupted sweep is repaired by simply running the next one.
//!
//! At most one sweep may run against a given root at a time. This is not
//! enforced here.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::{Catalog, CatalogError};
use crate::entry::{CatalogEntry, FileKey};

mod diff;
mod paths;
mod synth;
mod walk;

pub use diff::{Difference, difference};
pub use paths::{directory_column, reconstruct, relativize};
pub use synth::{Probe, probe, synthesize};
pub use walk::walk_files;

/// Errors that abort a sweep.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to walk {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Path {path:?} is not under {root:?}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Writes performed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub inserted: usize,
    pub deleted: usize,
}

impl SweepReport {
    /// Whether the sweep left the catalog untouched.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.deleted == 0
    }
}

/// Relative identities of every file under `storage_root`.
async fn storage_identities(
    storage_root: &Path,
    relative_root: &Path,
) -> Result<BTreeSet<PathBuf>, ReconcileError> {
    let files = walk_files(storage_root).await?;
    debug!(files = files.len(), "walked storage tree");
    files
        .iter()
        .map(|file| relativize(file, relative_root))
        .collect()
}

/// Relative identities implied by the catalog, with the keys of the rows
/// mapping to each.
async fn catalog_identities<C: Catalog + ?Sized>(
    catalog: &C,
    relative_root: &Path,
) -> Result<BTreeMap<PathBuf, Vec<FileKey>>, ReconcileError> {
    let entries = catalog.select_all().await?;
    debug!(rows = entries.len(), "read catalog");

    let mut identities: BTreeMap<PathBuf, Vec<FileKey>> = BTreeMap::new();
    for entry in entries {
        let identity = relativize(&reconstruct(relative_root, &entry), relative_root)?;
        identities.entry(identity).or_default().push(entry.key());
    }
    Ok(identities)
}

async fn synthesize_uncataloged(
    relative_root: &Path,
    uncataloged: &BTreeSet<PathBuf>,
) -> Vec<CatalogEntry> {
    join_all(
        uncataloged
            .iter()
            .map(|relative| synthesize(relative_root, relative)),
    )
    .await
}

/// Remove every key that is both a candidate and a stale row from both
/// batches.
///
/// The row is already stored under exactly that key, so it stays. Deleting
/// and inserting it concurrently would race on the primary key.
fn drop_rewrites(
    entries: Vec<CatalogEntry>,
    stale_keys: Vec<FileKey>,
) -> (Vec<CatalogEntry>, Vec<FileKey>) {
    let candidates: BTreeSet<FileKey> = entries.iter().map(CatalogEntry::key).collect();
    let overlap: BTreeSet<FileKey> = stale_keys
        .iter()
        .filter(|key| candidates.contains(*key))
        .cloned()
        .collect();
    if overlap.is_empty() {
        return (entries, stale_keys);
    }

    debug!(count = overlap.len(), "keeping rows stored under their synthesized key");
    let entries = entries
        .into_iter()
        .filter(|entry| !overlap.contains(&entry.key()))
        .collect();
    let stale_keys = stale_keys
        .into_iter()
        .filter(|key| !overlap.contains(key))
        .collect();
    (entries, stale_keys)
}

async fn insert_uncataloged<C: Catalog + ?Sized>(
    catalog: &C,
    entries: Vec<CatalogEntry>,
) -> Result<usize, ReconcileError> {
    if entries.is_empty() {
        debug!("nothing to insert");
        return Ok(0);
    }

    Ok(catalog.insert_batch(entries).await?)
}

async fn delete_stale<C: Catalog + ?Sized>(
    catalog: &C,
    keys: Vec<FileKey>,
) -> Result<usize, ReconcileError> {
    if keys.is_empty() {
        debug!("nothing to delete");
        return Ok(0);
    }

    Ok(catalog.delete_batch(keys).await?)
}

/// Bring `catalog` in line with the files under `storage_root`.
///
/// Both sides are expressed relative to `relative_root`, which must contain
/// `storage_root` (in practice they are the same directory). The storage
/// walk and the catalog read run concurrently, as do the insert and delete
/// that follow. A stale row whose key equals a synthesized row's key is
/// neither deleted nor inserted. The first error aborts the sweep; writes already committed
/// are kept.
pub async fn normalize<C: Catalog + ?Sized>(
    catalog: &C,
    storage_root: &Path,
    relative_root: &Path,
) -> Result<SweepReport, ReconcileError> {
    info!(?storage_root, "reconciling catalog");

    let (on_disk, cataloged) = tokio::try_join!(
        storage_identities(storage_root, relative_root),
        catalog_identities(catalog, relative_root),
    )?;

    let catalog_set: BTreeSet<PathBuf> = cataloged.keys().cloned().collect();
    let diff = difference(&on_disk, &catalog_set);
    debug!(
        uncataloged = diff.uncataloged.len(),
        stale = diff.stale.len(),
        "computed difference"
    );

    let stale_keys: Vec<FileKey> = diff
        .stale
        .iter()
        .filter_map(|identity| cataloged.get(identity))
        .flatten()
        .cloned()
        .collect();

    let candidates = synthesize_uncataloged(relative_root, &diff.uncataloged).await;
    let (entries, stale_keys) = drop_rewrites(candidates, stale_keys);

    let (inserted, deleted) = tokio::try_join!(
        insert_uncataloged(catalog, entries),
        delete_stale(catalog, stale_keys),
    )?;

    let report = SweepReport { inserted, deleted };
    info!(?storage_root, inserted, deleted, "catalog reconciled");
    Ok(report)
}
