use crate::error::{EtlError, Result};
use crate::types::ColumnMapping;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest page the source API will serve
pub const MAX_PAGE_SIZE: usize = 100;

/// Connection parameters for the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,

    /// Schema the tables are written into (`main` or an attached database)
    pub schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("dummydb.sqlite"),
            schema: String::from("main"),
        }
    }
}

/// Configuration for one pipeline run.
///
/// Passed explicitly to every entry point; there is no global default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Base URL of the source API, e.g. `https://dummyjson.com`
    pub base_url: String,

    /// Directory for `<resource>_raw.csv` artifacts
    pub raw_dir: PathBuf,

    /// Directory for cleaned artifacts
    pub processed_dir: PathBuf,

    /// Records requested per page
    pub page_size: usize,

    /// Per-request timeout, in seconds
    pub timeout_secs: u64,

    pub database: DatabaseConfig,

    /// Column renames applied when loading, keyed by destination table
    pub column_mappings: BTreeMap<String, ColumnMapping>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            base_url: String::from("https://dummyjson.com"),
            raw_dir: PathBuf::from("raw_data"),
            processed_dir: PathBuf::from("processed"),
            page_size: MAX_PAGE_SIZE,
            timeout_secs: 30,
            database: DatabaseConfig::default(),
            column_mappings: BTreeMap::new(),
        }
    }
}

impl EtlConfig {
    /// Load a config from a JSON file; omitted fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EtlError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        let config: EtlConfig = serde_json::from_str(&text)
            .map_err(|e| EtlError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(EtlError::InvalidConfig("base_url is empty".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(EtlError::InvalidConfig(format!(
                "page_size must be in 1..={}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.database.schema.trim().is_empty() {
            return Err(EtlError::InvalidConfig("database schema is empty".into()));
        }
        for (table, mapping) in &self.column_mappings {
            if let Some(target) = mapping.duplicate_target() {
                return Err(EtlError::InvalidConfig(format!(
                    "column mapping for `{}` sends several columns to `{}`",
                    table, target
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full URL of a named resource under the base URL
    pub fn resource_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), resource)
    }
}
