use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// One row: field path to value, in column order
pub type Record = Map<String, Value>;

/// Identifies a source collection and the artifacts derived from it.
///
/// Derived from the last path segment of the resource URL, e.g.
/// `https://dummyjson.com/products` -> `products`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        ResourceKey(key.into())
    }

    /// Take the final path segment, ignoring a query string and trailing slashes
    pub fn from_url(url: &str) -> Result<Self> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();

        if segment.is_empty() || segment.contains(':') {
            return Err(EtlError::InvalidResourceUrl(url.to_string()));
        }

        Ok(ResourceKey(segment.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A rectangular table of records.
///
/// Every row holds exactly the table's columns, in the table's column order;
/// absent values are `Value::Null`. Stages never mutate a table they were
/// handed, they build a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    /// Create an empty table with a fixed column set
    pub fn with_columns(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from loosely-shaped records.
    ///
    /// Columns are the union of all keys in first-seen order.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        for record in &records {
            for key in record.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = Table::with_columns(columns);
        for record in records {
            table.push_row(record);
        }
        table
    }

    /// Append a row, conforming it to the table's columns.
    ///
    /// Missing columns become null; keys outside the column set are dropped.
    pub fn push_row(&mut self, mut record: Record) {
        let row = self
            .columns
            .iter()
            .map(|column| {
                let value = record.remove(column).unwrap_or(Value::Null);
                (column.clone(), value)
            })
            .collect();
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Values of one column in row order (null for every row if absent)
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&Value::Null))
    }

    /// Map every value of one column, producing a new table
    pub fn map_column<F>(&self, column: &str, mut f: F) -> Table
    where
        F: FnMut(&Value) -> Value,
    {
        let mut out = self.clone();
        if !self.has_column(column) {
            return out;
        }
        for row in &mut out.rows {
            if let Some(value) = row.get_mut(column) {
                *value = f(value);
            }
        }
        out
    }

    /// Append a column computed from each row
    pub fn with_derived_column<F>(&self, column: &str, mut f: F) -> Table
    where
        F: FnMut(&Record) -> Value,
    {
        let mut columns = self.columns.clone();
        if !self.has_column(column) {
            columns.push(column.to_string());
        }

        let mut out = Table::with_columns(columns);
        for row in &self.rows {
            let value = f(row);
            let mut next = row.clone();
            next.insert(column.to_string(), value);
            out.push_row(next);
        }
        out
    }

    /// Drop columns by name; unknown names are ignored
    pub fn without_columns(&self, drop: &[&str]) -> Table {
        let columns = self
            .columns
            .iter()
            .filter(|c| !drop.contains(&c.as_str()))
            .cloned()
            .collect();

        let mut out = Table::with_columns(columns);
        for row in &self.rows {
            out.push_row(row.clone());
        }
        out
    }

    /// Rename columns via a mapping; unmapped columns keep their name.
    ///
    /// Fails if two columns would end up with the same name.
    pub fn renamed(&self, mapping: &ColumnMapping) -> Result<Table> {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| mapping.target(c).to_string())
            .collect();

        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(EtlError::InvalidConfig(format!(
                "column mapping produces duplicate column `{}`",
                dup
            )));
        }

        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| (mapping.target(k).to_string(), v.clone()))
                    .collect()
            })
            .collect();

        Ok(Table { columns, rows })
    }
}

/// Column-name remapping applied by a loader before writing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping(BTreeMap<String, String>);

impl ColumnMapping {
    pub fn new() -> Self {
        ColumnMapping::default()
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.0.insert(from.into(), to.into());
        self
    }

    /// Destination name for a source column
    pub fn target<'a>(&'a self, column: &'a str) -> &'a str {
        self.0.get(column).map(String::as_str).unwrap_or(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A target name shared by more than one source column, if any
    pub fn duplicate_target(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.0
            .values()
            .map(String::as_str)
            .find(|target| !seen.insert(*target))
    }
}

impl FromIterator<(String, String)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        ColumnMapping(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resource_key_from_url() {
        let key = ResourceKey::from_url("https://dummyjson.com/products").unwrap();
        assert_eq!(key.as_str(), "products");

        let key = ResourceKey::from_url("https://dummyjson.com/carts/?limit=5").unwrap();
        assert_eq!(key.as_str(), "carts");

        assert!(ResourceKey::from_url("https://").is_err());
    }

    #[test]
    fn test_from_records_fills_missing() {
        let table = Table::from_records(vec![
            record(json!({"id": 1, "name": "Alice"})),
            record(json!({"id": 2, "email": "bob@example.com"})),
        ]);

        assert_eq!(table.columns(), ["id", "name", "email"]);
        assert_eq!(table.rows()[0]["email"], Value::Null);
        assert_eq!(table.rows()[1]["name"], Value::Null);

        let keys: Vec<&String> = table.rows()[1].keys().collect();
        assert_eq!(keys, ["id", "name", "email"]);
    }

    #[test]
    fn test_derived_and_dropped_columns() {
        let table = Table::from_records(vec![record(json!({"a": 1, "b": 2}))]);
        let derived = table.with_derived_column("c", |row| json!(row["a"].as_i64().unwrap() + 10));
        assert_eq!(derived.columns(), ["a", "b", "c"]);
        assert_eq!(derived.rows()[0]["c"], json!(11));

        let dropped = derived.without_columns(&["a", "missing"]);
        assert_eq!(dropped.columns(), ["b", "c"]);
        // Source table untouched
        assert_eq!(table.columns(), ["a", "b"]);
    }

    #[test]
    fn test_renamed() {
        let table = Table::from_records(vec![record(json!({"meta.barcode": "123", "id": 1}))]);
        let mapping = ColumnMapping::new().rename("meta.barcode", "barcode");
        let renamed = table.renamed(&mapping).unwrap();

        assert_eq!(renamed.columns(), ["barcode", "id"]);
        assert_eq!(renamed.rows()[0]["barcode"], json!("123"));
    }

    #[test]
    fn test_renamed_rejects_colliding_columns() {
        let table = Table::from_records(vec![record(json!({"a": 1, "b": 2, "c": 3}))]);

        let merged = ColumnMapping::new().rename("a", "x").rename("b", "x");
        assert_eq!(merged.duplicate_target(), Some("x"));
        assert!(matches!(table.renamed(&merged), Err(EtlError::InvalidConfig(_))));

        // Renaming onto an existing unmapped column collides too
        let shadowed = ColumnMapping::new().rename("a", "c");
        assert_eq!(shadowed.duplicate_target(), None);
        assert!(matches!(table.renamed(&shadowed), Err(EtlError::InvalidConfig(_))));
    }
}
