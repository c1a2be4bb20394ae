//! Catalog rows and the file naming convention shared with the uploader.

use std::path::PathBuf;

use jiff::Timestamp;

/// Comment stored on rows that were discovered on disk rather than uploaded.
pub const NO_COMMENT: &str = "No comment";

/// Identity of a catalog row: `(name, extension, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileKey {
    pub name: String,
    pub extension: String,
    pub path: String,
}

/// One row of the `files` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// File name without its suffixes
    pub name: String,
    /// Suffixes joined together, without the leading separator
    pub extension: String,
    /// Directory relative to the storage root, empty for the root itself
    pub path: String,
    pub size: u64,
    /// ISO-8601 UTC timestamp, empty when unknown
    pub created_at: String,
    pub updated_at: Option<String>,
    pub comment: Option<String>,
}

impl CatalogEntry {
    pub fn key(&self) -> FileKey {
        FileKey {
            name: self.name.clone(),
            extension: self.extension.clone(),
            path: self.path.clone(),
        }
    }
}

/// Build the storage-relative location of a file from its catalog identity.
///
/// This is the single join rule used by uploads and by reconciliation, so a
/// row written by one always maps to the same file as seen by the other:
/// - leading `.` and `/` are stripped from `path`, and both `/` and `\` are
///   treated as directory separators;
/// - leading `/` is stripped from `name`;
/// - leading `.`, `/` and `\` are stripped from `extension`.
///
/// When `name` or `extension` ends up empty the file is placed at the root as
/// `file_<epoch-millis>.bin`.
pub fn upload_path(path: &str, name: &str, extension: &str) -> PathBuf {
    let dir = path.trim_start_matches(['.', '/']);
    let name = name.trim_start_matches('/');
    let extension = extension.trim_start_matches(['.', '/', '\\']);

    if name.is_empty() || extension.is_empty() {
        return PathBuf::from(format!("file_{}.bin", Timestamp::now().as_millisecond()));
    }

    let mut out = PathBuf::new();
    for part in dir.split(['/', '\\']) {
        if !part.is_empty() && part != "." {
            out.push(part);
        }
    }
    out.push(format!("{name}.{extension}"));
    out
}

/// Split a file name into its stem and joined suffixes.
///
/// The split happens at the first dot after any leading dots, so
/// `archive.tar.gz` gives `("archive", "tar.gz")` and `.bashrc` has no
/// suffix at all. Joining the two halves with a dot gives back the original
/// name whenever the suffix is non-empty.
pub fn split_file_name(file_name: &str) -> (&str, &str) {
    let body = file_name.trim_start_matches('.');
    let offset = file_name.len() - body.len();
    match body.find('.') {
        Some(dot) => (
            &file_name[..offset + dot],
            &file_name[offset + dot + 1..],
        ),
        None => (file_name, ""),
    }
}
