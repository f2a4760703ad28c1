//! Error type shared by every pipeline stage.
//!
//! Each variant names the stage that failed so a caller can report
//! "fetch aborted" versus "transform aborted" without inspecting strings.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("invalid resource url `{0}`: no final path segment")]
    InvalidResourceUrl(String),

    #[error("fetch failed for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("fetch failed for {url}: HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("fetch failed for {url}: malformed JSON ({reason})")]
    MalformedJson { url: String, reason: String },

    #[error("fetch failed for {url}: response has no integer `total`")]
    MissingTotal { url: String },

    #[error("fetch failed for {url}: response has no `{key}` list")]
    MissingCollection { url: String, key: String },

    #[error("transform aborted: malformed list in `{field}` at row {row}: {reason}")]
    MalformedList {
        field: String,
        row: usize,
        reason: String,
    },

    #[error("{stage} aborted: column `{column}` not present")]
    MissingColumn { stage: &'static str, column: String },

    #[error("failed writing artifact {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed encoding artifact {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("load failed during {stage}: {source}")]
    Database {
        stage: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EtlError {
    pub(crate) fn database(stage: &'static str) -> impl FnOnce(rusqlite::Error) -> EtlError {
        move |source| EtlError::Database { stage, source }
    }
}
