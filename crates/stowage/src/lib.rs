//! Stowage - file catalog reconciliation
//!
//! Keeps a per-tenant catalog of stored files (one row per file: name,
//! extension, directory, size, timestamps, comment) consistent with what is
//! actually on disk under the tenant's storage root.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod entry;
pub mod reconcile;

pub use bootstrap::{BootstrapError, bootstrap_all, bootstrap_tenant, open_catalog};
pub use config::{Config, ConfigError, DbSettings, TenantConfig};
pub use db::{Catalog, CatalogError, SqliteCatalog};
pub use entry::{CatalogEntry, FileKey, NO_COMMENT, split_file_name, upload_path};
pub use reconcile::{ReconcileError, SweepReport, normalize};
