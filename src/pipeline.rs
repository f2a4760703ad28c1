//! Pipeline entry points.
//!
//! fetch -> normalize -> raw artifact -> resource transforms -> cleaned
//! artifacts -> load. Stages run sequentially; every entry point takes the
//! run's [`EtlConfig`] explicitly.

use crate::config::EtlConfig;
use crate::error::Result;
use crate::fetch::{Fetcher, HttpTransport, Transport};
use crate::flatten::normalize;
use crate::resources::{transform_carts, transform_products, transform_reviews, Resource};
use crate::sink::{ArtifactWriter, TableLoader};
use crate::types::{ResourceKey, Table};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// What happened to one output table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub artifact: PathBuf,
    pub loaded: bool,
}

/// Summary of a pipeline run, one entry per table produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub tables: Vec<TableSummary>,
}

impl RunReport {
    pub fn table(&self, name: &str) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.name == name)
    }
}

pub struct Pipeline<T: Transport> {
    config: EtlConfig,
    fetcher: Fetcher<T>,
}

impl Pipeline<HttpTransport> {
    /// Pipeline over HTTP with the config's timeout
    pub fn from_config(config: EtlConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Pipeline<T> {
    pub fn with_transport(config: EtlConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(transport, config.page_size);
        Ok(Pipeline { config, fetcher })
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Fetch and normalize a resource, writing `<resource>_raw.csv`
    pub fn extract(&self, resource: &str) -> Result<Table> {
        let (table, _) = self.extract_with_artifact(resource)?;
        Ok(table)
    }

    fn extract_with_artifact(&self, resource: &str) -> Result<(Table, PathBuf)> {
        let url = self.config.resource_url(resource);
        let key = ResourceKey::from_url(&url)?;

        let fetched = self.fetcher.fetch(&url)?;
        let table = normalize(&fetched);

        let writer = ArtifactWriter::new(&self.config.raw_dir)?;
        let path = writer.write(&table, &format!("{}_raw.csv", key))?;
        Ok((table, path))
    }

    /// Run the given resources end to end.
    ///
    /// Tables are loaded only when a loader is supplied. The first failure
    /// aborts the run.
    pub fn run(
        &self,
        resources: &[Resource],
        mut loader: Option<&mut dyn TableLoader>,
    ) -> Result<RunReport> {
        let processed = ArtifactWriter::new(&self.config.processed_dir)?;
        let mut report = RunReport::default();

        for &resource in resources {
            info!(%resource, "starting resource");
            let (raw, raw_path) = self.extract_with_artifact(resource.name())?;
            report.tables.push(TableSummary {
                name: format!("{}_raw", resource),
                rows: raw.len(),
                columns: raw.columns().len(),
                artifact: raw_path,
                loaded: false,
            });

            let outputs: Vec<(&str, &str, Table)> = match resource {
                Resource::Products => vec![
                    ("products", "products_cleaned.csv", transform_products(&raw)?),
                    ("reviews", "reviews.csv", transform_reviews(&raw)?),
                ],
                Resource::Carts => vec![("carts", "carts_cleaned.csv", transform_carts(&raw)?)],
            };

            for (name, file_name, table) in outputs {
                let artifact = processed.write(&table, file_name)?;
                let loaded = match loader.as_deref_mut() {
                    Some(loader) => {
                        let mapping = self.config.column_mappings.get(name);
                        loader.load(&table, name, mapping)?;
                        true
                    }
                    None => false,
                };

                report.tables.push(TableSummary {
                    name: name.to_string(),
                    rows: table.len(),
                    columns: table.columns().len(),
                    artifact,
                    loaded,
                });
            }
        }

        Ok(report)
    }
}
