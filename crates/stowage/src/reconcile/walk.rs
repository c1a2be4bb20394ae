//! Storage tree enumeration.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::trace;

use super::ReconcileError;

/// List every regular file below `root`, at any depth.
///
/// Directories are traversed with an explicit worklist instead of recursion,
/// so nesting depth never grows the call stack. Entries are classified by
/// their directory-entry type: symlinks and other special files are neither
/// followed nor returned. The order of the result is unspecified.
pub async fn walk_files(root: &Path) -> Result<Vec<PathBuf>, ReconcileError> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(dir) = pending.pop() {
        trace!(?dir, "listing directory");
        let walk_err = |source| ReconcileError::Walk {
            path: dir.clone(),
            source,
        };

        let mut entries = fs::read_dir(&dir).await.map_err(walk_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(walk_err)? {
            let file_type = entry.file_type().await.map_err(walk_err)?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}
