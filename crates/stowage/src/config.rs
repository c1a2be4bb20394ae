//! Tenant configuration.
//!
//! The configuration file is YAML. Any `${NAME}` in it is replaced by the
//! value of the environment variable `NAME` before parsing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use regex::{Captures, Regex};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid substitution pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),

    #[error("Tenant {tenant}: the {backend} backend is not supported")]
    UnsupportedBackend {
        tenant: String,
        backend: &'static str,
    },
}

/// Top-level configuration: one entry per tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub applications: BTreeMap<String, TenantConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    pub app_vars: AppVars,
    pub db_settings: DbSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppVars {
    /// Storage root for this tenant's files
    pub save_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "db_type")]
pub enum DbSettings {
    #[serde(rename = "SQLite")]
    Sqlite { db_name: String, db_path: PathBuf },

    /// Accepted by the parser only; [`crate::open_catalog`] rejects it.
    ///
    /// Credentials (`<TENANT>_DB_USERNAME`, `<TENANT>_DB_PASSWORD`) are not
    /// read, since no connection is ever made.
    #[serde(rename = "PostgreSQL")]
    Postgres {
        db_name: String,
        db_host: String,
        db_port: u16,
    },
}

impl DbSettings {
    pub fn backend(&self) -> &'static str {
        match self {
            DbSettings::Sqlite { .. } => "SQLite",
            DbSettings::Postgres { .. } => "PostgreSQL",
        }
    }
}

/// Replace every `${NAME}` in `text` using `lookup`.
pub fn substitute_env(
    text: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let pattern = Regex::new(r"\$\{([A-Za-z0-9_]+)\}")?;

    let mut missing = None;
    let replaced = pattern.replace_all(text, |caps: &Captures<'_>| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| {
            missing.get_or_insert_with(|| name.to_owned());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnv(name)),
        None => Ok(replaced.into_owned()),
    }
}

impl Config {
    /// Parse a configuration, substituting from the process environment.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let text = substitute_env(text, |name| env::var(name).ok())?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }
}
