//! Catalog database.
//!
//! The reconciliation engine only talks to the catalog through the narrow
//! [`Catalog`] trait. [`SqliteCatalog`] is the SQLite-backed implementation,
//! which also carries the single-row operations used by uploads.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use tracing::{debug, trace};

use crate::entry::{CatalogEntry, FileKey};

/// Database error type.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Database connection lock poisoned")]
    Poisoned,
}

/// Repository interface used by reconciliation.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Read every row of the catalog.
    async fn select_all(&self) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Insert all entries as one batch. Returns the number of rows written.
    async fn insert_batch(&self, entries: Vec<CatalogEntry>) -> Result<usize, CatalogError>;

    /// Delete every row whose exact key is in `keys`. Returns the number of
    /// rows removed.
    async fn delete_batch(&self, keys: Vec<FileKey>) -> Result<usize, CatalogError>;
}

const COLUMNS: &str = "name, extension, path, size, created_at, updated_at, comment";

/// Key match treating NULL identity columns as empty strings, the same way
/// rows are read back.
const KEY_MATCH: &str =
    "COALESCE(name, '') = ?1 AND COALESCE(extension, '') = ?2 AND COALESCE(path, '') = ?3";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    let name: Option<String> = row.get(0)?;
    let extension: Option<String> = row.get(1)?;
    let path: Option<String> = row.get(2)?;
    let size: i64 = row.get(3)?;
    Ok(CatalogEntry {
        name: name.unwrap_or_default(),
        extension: extension.unwrap_or_default(),
        path: path.unwrap_or_default(),
        size: size.max(0) as u64,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        comment: row.get(6)?,
    })
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// SQLite catalog for one tenant.
///
/// Queries run on the blocking pool so that a slow database never stalls the
/// scheduler while other tenants are walking their trees.
#[derive(Clone)]
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    /// Open or create the catalog database at `path`.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, CatalogError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, CatalogError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| CatalogError::Poisoned)?;
            f(&mut *conn)
        })
        .await?
    }

    /// Create the `files` table if it does not exist yet.
    pub async fn create_schema(&self) -> Result<(), CatalogError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS files (
                    name TEXT,
                    extension TEXT,
                    size INTEGER NOT NULL,
                    path TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT,
                    comment TEXT,
                    CONSTRAINT pk_files PRIMARY KEY (name, extension, path)
                );
                "#,
            )?;
            Ok(())
        })
        .await
    }

    /// Drop the `files` table.
    pub async fn drop_schema(&self) -> Result<(), CatalogError> {
        self.with_conn(|conn| {
            conn.execute_batch("DROP TABLE IF EXISTS files;")?;
            Ok(())
        })
        .await
    }

    /// Insert a single row.
    pub async fn insert(&self, entry: CatalogEntry) -> Result<(), CatalogError> {
        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO files ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    entry.name,
                    entry.extension,
                    entry.path,
                    entry.size as i64,
                    entry.created_at,
                    entry.updated_at,
                    entry.comment,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Look up a row by its exact key.
    pub async fn select(&self, key: FileKey) -> Result<Option<CatalogEntry>, CatalogError> {
        self.with_conn(move |conn| {
            let entry = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM files WHERE {KEY_MATCH}"),
                    params![key.name, key.extension, key.path],
                    entry_from_row,
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }

    /// Rows whose directory starts with `prefix`.
    pub async fn search(&self, prefix: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        let pattern = format!("{}%", escape_like(prefix));
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM files WHERE COALESCE(path, '') LIKE ?1 ESCAPE '\\' ORDER BY path, name, extension"
            ))?;
            let rows = stmt.query_map(params![pattern], entry_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    /// Delete a row by its exact key. Returns whether a row was removed.
    pub async fn delete(&self, key: FileKey) -> Result<bool, CatalogError> {
        self.with_conn(move |conn| {
            let rows = conn.execute(
                &format!("DELETE FROM files WHERE {KEY_MATCH}"),
                params![key.name, key.extension, key.path],
            )?;
            Ok(rows > 0)
        })
        .await
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn select_all(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM files"))?;
            let rows = stmt.query_map([], entry_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn insert_batch(&self, entries: Vec<CatalogEntry>) -> Result<usize, CatalogError> {
        if entries.is_empty() {
            trace!("empty insert batch, skipping");
            return Ok(0);
        }

        self.with_conn(move |conn| {
            // Rolled back on drop if anything below fails.
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO files ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ))?;
                for entry in &entries {
                    stmt.execute(params![
                        entry.name,
                        entry.extension,
                        entry.path,
                        entry.size as i64,
                        entry.created_at,
                        entry.updated_at,
                        entry.comment,
                    ])?;
                }
            }
            tx.commit()?;
            debug!(rows = entries.len(), "inserted catalog rows");
            Ok(entries.len())
        })
        .await
    }

    async fn delete_batch(&self, keys: Vec<FileKey>) -> Result<usize, CatalogError> {
        if keys.is_empty() {
            trace!("empty delete batch, skipping");
            return Ok(0);
        }

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare(&format!("DELETE FROM files WHERE {KEY_MATCH}"))?;
                for key in &keys {
                    removed += stmt.execute(params![key.name, key.extension, key.path])?;
                }
            }
            tx.commit()?;
            debug!(rows = removed, "deleted catalog rows");
            Ok(removed)
        })
        .await
    }
}
