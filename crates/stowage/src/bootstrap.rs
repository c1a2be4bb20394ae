//! Per-tenant startup: directories, catalog database, reconciliation sweep.

use std::io;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::config::{Config, ConfigError, DbSettings, TenantConfig};
use crate::db::{CatalogError, SqliteCatalog};
use crate::reconcile::{ReconcileError, SweepReport, normalize};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to create {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Reconciliation failed for {tenant}: {source}")]
    Reconcile {
        tenant: String,
        #[source]
        source: ReconcileError,
    },
}

async fn ensure_dir(path: &Path) -> Result<(), BootstrapError> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| BootstrapError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}

/// Open the tenant's catalog, creating its database and schema if needed.
pub async fn open_catalog(
    tenant: &str,
    settings: &DbSettings,
) -> Result<SqliteCatalog, BootstrapError> {
    let db_file = match settings {
        DbSettings::Sqlite { db_name, db_path } => {
            ensure_dir(db_path).await?;
            db_path.join(db_name)
        }
        other => {
            return Err(ConfigError::UnsupportedBackend {
                tenant: tenant.to_owned(),
                backend: other.backend(),
            }
            .into());
        }
    };

    let catalog = SqliteCatalog::open(&db_file)?;
    catalog.create_schema().await?;
    info!(tenant, ?db_file, "opened catalog");
    Ok(catalog)
}

/// Prepare one tenant and reconcile its catalog with its storage root.
pub async fn bootstrap_tenant(
    tenant: &str,
    config: &TenantConfig,
) -> Result<SweepReport, BootstrapError> {
    let save_path = &config.app_vars.save_path;
    ensure_dir(save_path).await?;

    let catalog = open_catalog(tenant, &config.db_settings).await?;
    normalize(&catalog, save_path, save_path)
        .await
        .map_err(|source| BootstrapError::Reconcile {
            tenant: tenant.to_owned(),
            source,
        })
}

/// Bootstrap every tenant concurrently. Fails on the first tenant error.
pub async fn bootstrap_all(config: &Config) -> Result<Vec<(String, SweepReport)>, BootstrapError> {
    try_join_all(config.applications.iter().map(|(tenant, tenant_config)| async move {
        let report = bootstrap_tenant(tenant, tenant_config).await?;
        Ok::<_, BootstrapError>((tenant.clone(), report))
    }))
    .await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs as std_fs;

    use tempfile::TempDir;

    use super::*;
    use crate::config::AppVars;
    use crate::db::Catalog;

    fn sqlite_tenant(root: &Path, name: &str) -> TenantConfig {
        TenantConfig {
            app_vars: AppVars {
                save_path: root.join(name).join("files"),
            },
            db_settings: DbSettings::Sqlite {
                db_name: "catalog.db".into(),
                db_path: root.join(name).join("db"),
            },
        }
    }

    #[tokio::test]
    async fn test_bootstrap_creates_directories() {
        let temp = TempDir::new().unwrap();
        let tenant = sqlite_tenant(temp.path(), "alpha");

        let report = bootstrap_tenant("alpha", &tenant).await.unwrap();
        assert!(report.is_noop());
        assert!(temp.path().join("alpha/files").is_dir());
        assert!(temp.path().join("alpha/db/catalog.db").is_file());
    }

    #[tokio::test]
    async fn test_bootstrap_all_tenants() {
        let temp = TempDir::new().unwrap();
        let alpha = sqlite_tenant(temp.path(), "alpha");
        let beta = sqlite_tenant(temp.path(), "beta");
        std_fs::create_dir_all(&alpha.app_vars.save_path).unwrap();
        std_fs::write(alpha.app_vars.save_path.join("a.txt"), b"a").unwrap();
        std_fs::create_dir_all(beta.app_vars.save_path.join("docs")).unwrap();
        std_fs::write(beta.app_vars.save_path.join("docs/b.txt"), b"b").unwrap();
        std_fs::write(beta.app_vars.save_path.join("c.pdf"), b"c").unwrap();

        let config = Config {
            applications: BTreeMap::from([("alpha".to_owned(), alpha), ("beta".to_owned(), beta)]),
        };

        let reports = bootstrap_all(&config).await.unwrap();
        assert_eq!(
            reports,
            vec![
                ("alpha".to_owned(), SweepReport { inserted: 1, deleted: 0 }),
                ("beta".to_owned(), SweepReport { inserted: 2, deleted: 0 }),
            ]
        );

        // Second startup finds nothing to do.
        let reports = bootstrap_all(&config).await.unwrap();
        assert!(reports.iter().all(|(_, report)| report.is_noop()));

        let catalog = open_catalog("beta", &config.applications["beta"].db_settings)
            .await
            .unwrap();
        assert_eq!(catalog.select_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_postgres_is_rejected() {
        let settings = DbSettings::Postgres {
            db_name: "beta".into(),
            db_host: "localhost".into(),
            db_port: 5432,
        };

        match open_catalog("beta", &settings).await {
            Err(BootstrapError::Config(ConfigError::UnsupportedBackend { tenant, backend })) => {
                assert_eq!(tenant, "beta");
                assert_eq!(backend, "PostgreSQL");
            }
            Err(other) => panic!("expected unsupported backend, got {other:?}"),
            Ok(_) => panic!("expected unsupported backend"),
        }
    }
}
