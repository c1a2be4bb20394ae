//! Relative path identities shared by the storage and catalog sides.

use std::path::{Component, Path, PathBuf};

use crate::entry::{CatalogEntry, upload_path};

use super::ReconcileError;

/// Make `path` relative to `root`.
///
/// The result is rebuilt component by component, dropping `.` segments, so
/// two identities compare equal exactly when their components do.
pub fn relativize(path: &Path, root: &Path) -> Result<PathBuf, ReconcileError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ReconcileError::OutsideRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })?;

    let mut out = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Where the file behind a catalog row is expected to live.
pub fn reconstruct(root: &Path, entry: &CatalogEntry) -> PathBuf {
    root.join(upload_path(&entry.path, &entry.name, &entry.extension))
}

/// The catalog `path` column for a relative file location: its parent
/// directory with `/` separators, empty at the root.
pub fn directory_column(relative: &Path) -> String {
    relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}
