//! Catalog rows for files found on disk without one.

use std::fs::Metadata;
use std::io;
use std::path::Path;

use jiff::Timestamp;
use tokio::fs;
use tracing::{debug, warn};

use crate::entry::{CatalogEntry, NO_COMMENT, split_file_name};

use super::paths::directory_column;

/// Outcome of looking a file up on disk.
#[derive(Debug)]
pub enum Probe {
    Found(Metadata),
    NotFound,
    Failed(io::Error),
}

/// Stat `path` without treating a missing file as an error.
pub async fn probe(path: &Path) -> Probe {
    match fs::metadata(path).await {
        Ok(meta) => Probe::Found(meta),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Probe::NotFound,
        Err(err) => Probe::Failed(err),
    }
}

/// Creation time as ISO-8601 UTC, falling back to modification time on
/// filesystems that do not record birth time. Empty if neither is available.
fn created_at(meta: &Metadata) -> String {
    meta.created()
        .or_else(|_| meta.modified())
        .ok()
        .and_then(|time| Timestamp::try_from(time).ok())
        .map(|ts| ts.to_string())
        .unwrap_or_default()
}

/// Build a catalog row for the file at `relative` under `root`.
///
/// Files without a suffix get the current epoch milliseconds as extension.
/// That value is not guaranteed unique across files synthesized in the same
/// millisecond.
///
/// If the file cannot be stat'ed (typically because it was removed after the
/// walk) the row is still produced, with a size of zero and an empty creation
/// time.
pub async fn synthesize(root: &Path, relative: &Path) -> CatalogEntry {
    let file_name = relative
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (name, extension) = split_file_name(&file_name);
    let extension = extension.trim_start_matches(['.', '/', '\\']);
    let extension = if extension.is_empty() {
        Timestamp::now().as_millisecond().to_string()
    } else {
        extension.to_owned()
    };

    let (size, created_at) = match probe(&root.join(relative)).await {
        Probe::Found(meta) => (meta.len(), created_at(&meta)),
        Probe::NotFound => {
            debug!(?relative, "file vanished before stat, cataloging placeholder");
            (0, String::new())
        }
        Probe::Failed(err) => {
            warn!(?relative, %err, "could not stat file, cataloging placeholder");
            (0, String::new())
        }
    };

    CatalogEntry {
        name: name.to_owned(),
        extension,
        path: directory_column(relative),
        size,
        created_at,
        updated_at: None,
        comment: Some(NO_COMMENT.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_synthesize_existing_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("docs")).unwrap();
        fs::write(temp.path().join("docs/a.tar.gz"), b"hello").unwrap();

        let entry = synthesize(temp.path(), Path::new("docs/a.tar.gz")).await;
        assert_eq!(entry.name, "a");
        assert_eq!(entry.extension, "tar.gz");
        assert_eq!(entry.path, "docs");
        assert_eq!(entry.size, 5);
        assert!(entry.created_at.parse::<Timestamp>().is_ok());
        assert_eq!(entry.updated_at, None);
        assert_eq!(entry.comment.as_deref(), Some(NO_COMMENT));
    }

    #[tokio::test]
    async fn test_synthesize_vanished_file() {
        let temp = TempDir::new().unwrap();

        let entry = synthesize(temp.path(), Path::new("docs/gone.txt")).await;
        assert_eq!(entry.name, "gone");
        assert_eq!(entry.extension, "txt");
        assert_eq!(entry.path, "docs");
        assert_eq!(entry.size, 0);
        assert_eq!(entry.created_at, "");
    }

    #[tokio::test]
    async fn test_synthesize_without_suffix() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("readme"), b"read me").unwrap();

        let entry = synthesize(temp.path(), Path::new("readme")).await;
        assert_eq!(entry.name, "readme");
        assert_eq!(entry.path, "");
        assert!(!entry.extension.is_empty());
        assert!(entry.extension.parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn test_probe() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("here"), b"x").unwrap();

        assert!(matches!(probe(&temp.path().join("here")).await, Probe::Found(_)));
        assert!(matches!(probe(&temp.path().join("gone")).await, Probe::NotFound));
    }
}
