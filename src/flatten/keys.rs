use crate::types::{Record, Table};
use serde_json::Value;

/// Strictly increasing surrogate keys starting at 1
#[derive(Debug, Clone)]
pub struct SurrogateKeys {
    next: u64,
}

impl SurrogateKeys {
    pub fn new() -> Self {
        SurrogateKeys { next: 1 }
    }
}

impl Default for SurrogateKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for SurrogateKeys {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let key = self.next;
        self.next += 1;
        Some(key)
    }
}

/// Number rows `1..=N` in row order under `column`, placed first.
///
/// An existing column of the same name is replaced.
pub fn assign_surrogate_keys(table: &Table, column: &str) -> Table {
    let mut columns = vec![column.to_string()];
    columns.extend(table.columns().iter().filter(|c| c.as_str() != column).cloned());

    let mut out = Table::with_columns(columns);
    for (row, key) in table.rows().iter().zip(SurrogateKeys::new()) {
        let mut record = Record::new();
        record.insert(column.to_string(), Value::from(key));
        for (k, v) in row {
            if k != column {
                record.insert(k.clone(), v.clone());
            }
        }
        out.push_row(record);
    }
    out
}
