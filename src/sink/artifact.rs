use crate::error::{EtlError, Result};
use crate::types::Table;
use serde_json::Value;
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes tables as CSV files into one directory.
///
/// An existing file at the target path is removed before writing, never
/// appended to.
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Create a writer for `dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| EtlError::Artifact {
            path: dir.clone(),
            source,
        })?;
        Ok(ArtifactWriter { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `table` to `<dir>/<file_name>`, replacing any previous file
    pub fn write(&self, table: &Table, file_name: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        let io_err = |source| EtlError::Artifact {
            path: path.clone(),
            source,
        };

        if path.exists() {
            std::fs::remove_file(&path).map_err(io_err)?;
        }
        let file = std::fs::File::create(&path).map_err(io_err)?;
        write_csv(table, std::io::BufWriter::new(file)).map_err(|source| EtlError::Csv {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), rows = table.len(), "wrote artifact");
        Ok(path)
    }
}

/// Encode a table as UTF-8 CSV with one header row
pub fn write_csv<W: Write>(table: &Table, writer: W) -> csv::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if table.columns().is_empty() {
        csv.flush()?;
        return Ok(());
    }

    csv.write_record(table.columns())?;
    for row in table.rows() {
        csv.write_record(
            table
                .columns()
                .iter()
                .map(|column| cell_text(row.get(column).unwrap_or(&Value::Null)).into_owned()),
        )?;
    }
    csv.flush()?;
    Ok(())
}

/// Text form of one cell: empty for null, JSON text for lists and mappings
pub fn cell_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
    }
}
