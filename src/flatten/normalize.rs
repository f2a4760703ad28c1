use crate::types::{Record, Table};
use serde_json::{Map, Value};
use tracing::debug;

/// Flattens nested mappings into dotted-path columns.
///
/// Lists are left untouched as lists; later stages decide how to expand them.
#[derive(Debug, Clone)]
pub struct Normalizer {
    separator: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer {
            separator: String::from("."),
        }
    }
}

impl Normalizer {
    pub fn new(separator: impl Into<String>) -> Self {
        Normalizer {
            separator: separator.into(),
        }
    }

    /// Flatten every record and union their columns in first-seen order
    pub fn normalize(&self, records: &[Record]) -> Table {
        let flattened: Vec<Record> = records.iter().map(|r| self.flatten(r)).collect();
        let table = Table::from_records(flattened);
        debug!(rows = table.len(), columns = table.columns().len(), "normalized records");
        table
    }

    /// Flatten a single record
    pub fn flatten(&self, record: &Record) -> Record {
        let mut out = Map::new();
        self.flatten_into(&mut out, None, record);
        out
    }

    fn flatten_into(&self, out: &mut Record, prefix: Option<&str>, obj: &Map<String, Value>) {
        for (key, value) in obj {
            let path = match prefix {
                Some(p) => format!("{}{}{}", p, self.separator, key),
                None => key.clone(),
            };

            match value {
                Value::Object(inner) => self.flatten_into(out, Some(&path), inner),
                _ => {
                    out.insert(path, value.clone());
                }
            }
        }
    }
}

/// Normalize with the default `.` separator
pub fn normalize(records: &[Record]) -> Table {
    Normalizer::default().normalize(records)
}

/// Flatten one record with the default `.` separator
pub fn flatten_record(record: &Record) -> Record {
    Normalizer::default().flatten(record)
}
