use crate::error::{EtlError, Result};
use crate::flatten::literal::{list_cell, ListPolicy};
use crate::flatten::normalize::flatten_record;
use crate::types::{Record, Table};
use serde_json::Value;
use std::collections::HashSet;
use tracing::info;

/// Which parent columns an exploded row inherits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Carry {
    /// Every column except the exploded field, unchanged
    AllColumns,
    /// Only the named columns, each under a new name (`from`, `to`)
    Keys(Vec<(String, String)>),
}

/// How to explode a list-of-mappings field into rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplodeSpec {
    pub source_field: String,

    /// Element fields are written as `<prefix>_<field>`; unprefixed when `None`
    pub nested_prefix: Option<String>,

    pub carry: Carry,
}

impl ExplodeSpec {
    pub fn new(source_field: impl Into<String>) -> Self {
        ExplodeSpec {
            source_field: source_field.into(),
            nested_prefix: None,
            carry: Carry::AllColumns,
        }
    }

    pub fn prefixed(mut self, prefix: impl Into<String>) -> Self {
        self.nested_prefix = Some(prefix.into());
        self
    }

    /// Carry `from` into every exploded row as `to`.
    ///
    /// Switches the carry mode to [`Carry::Keys`].
    pub fn carrying(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let key = (from.into(), to.into());
        match &mut self.carry {
            Carry::Keys(keys) => keys.push(key),
            Carry::AllColumns => self.carry = Carry::Keys(vec![key]),
        }
        self
    }

    fn element_column(&self, field: &str) -> String {
        match &self.nested_prefix {
            Some(prefix) => format!("{}_{}", prefix, field),
            None => field.to_string(),
        }
    }
}

/// Explode a list-of-mappings field into one row per element.
///
/// Lists are parsed for every row before any output is built; a malformed
/// list aborts the transform. A row with an empty list still yields one row,
/// with the element columns null.
pub fn explode(table: &Table, spec: &ExplodeSpec) -> Result<Table> {
    let source = spec.source_field.as_str();
    require_column(table, source)?;
    if let Carry::Keys(keys) = &spec.carry {
        for (from, _) in keys {
            require_column(table, from)?;
        }
    }

    let elements = table
        .column_values(source)
        .enumerate()
        .map(|(row, cell)| {
            list_cell(cell, ListPolicy::Strict, source, row)?
                .into_iter()
                .enumerate()
                .map(|(idx, element)| match element {
                    Value::Object(map) => Ok(flatten_record(&map)),
                    other => Err(EtlError::MalformedList {
                        field: source.to_string(),
                        row,
                        reason: format!("element {} is not a mapping: {}", idx, other),
                    }),
                })
                .collect::<Result<Vec<Record>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut columns: Vec<String> = match &spec.carry {
        Carry::AllColumns => table
            .columns()
            .iter()
            .filter(|c| c.as_str() != source)
            .cloned()
            .collect(),
        Carry::Keys(keys) => keys.iter().map(|(_, to)| to.clone()).collect(),
    };
    let mut seen: HashSet<String> = columns.iter().cloned().collect();
    for field in elements.iter().flatten().flat_map(|element| element.keys()) {
        let column = spec.element_column(field);
        if seen.insert(column.clone()) {
            columns.push(column);
        }
    }

    let mut out = Table::with_columns(columns);
    for (row, items) in table.rows().iter().zip(elements) {
        let parent = carried(row, spec);
        if items.is_empty() {
            out.push_row(parent);
            continue;
        }
        for item in items {
            let mut record = parent.clone();
            for (field, value) in item {
                record.insert(spec.element_column(&field), value);
            }
            out.push_row(record);
        }
    }

    info!(field = source, parents = table.len(), rows = out.len(), "exploded list into rows");
    Ok(out)
}

fn require_column(table: &Table, column: &str) -> Result<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(EtlError::MissingColumn {
            stage: "list explosion",
            column: column.to_string(),
        })
    }
}

fn carried(row: &Record, spec: &ExplodeSpec) -> Record {
    match &spec.carry {
        Carry::AllColumns => row
            .iter()
            .filter(|(k, _)| k.as_str() != spec.source_field)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        Carry::Keys(keys) => keys
            .iter()
            .map(|(from, to)| (to.clone(), row.get(from).cloned().unwrap_or(Value::Null)))
            .collect(),
    }
}
