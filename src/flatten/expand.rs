use crate::error::{EtlError, Result};
use crate::flatten::literal::{list_cell, ListPolicy};
use crate::types::{Record, Table};
use serde_json::Value;
use tracing::info;

/// Column names `<prefix>_1 ..= <prefix>_width`
pub fn indexed_columns(prefix: &str, width: usize) -> Vec<String> {
    (1..=width).map(|i| format!("{}_{}", prefix, i)).collect()
}

/// Index of a column in the `<prefix>_<i>` family, if it belongs to it
pub(crate) fn column_index(prefix: &str, column: &str) -> Option<usize> {
    let index = column.strip_prefix(prefix)?.strip_prefix('_')?;
    if !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    index.parse::<usize>().ok().filter(|i| *i >= 1)
}

/// Expand a list-of-scalars field into a fixed family of indexed columns.
///
/// The family is as wide as the longest list in the table; shorter lists are
/// padded with null. A cell that does not parse as a list counts as empty for
/// that row only. The source field is dropped.
pub fn expand_array(table: &Table, source_field: &str, output_prefix: &str) -> Result<Table> {
    if !table.has_column(source_field) {
        return Err(EtlError::MissingColumn {
            stage: "array expansion",
            column: source_field.to_string(),
        });
    }

    let lists = table
        .column_values(source_field)
        .enumerate()
        .map(|(row, cell)| list_cell(cell, ListPolicy::Recover, source_field, row))
        .collect::<Result<Vec<_>>>()?;

    let width = lists.iter().map(Vec::len).max().unwrap_or(0);
    let family = indexed_columns(output_prefix, width);

    let mut columns: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| c.as_str() != source_field)
        .cloned()
        .collect();
    columns.extend(family.iter().cloned());

    let mut out = Table::with_columns(columns);
    for (row, list) in table.rows().iter().zip(lists) {
        let mut record: Record = row.clone();
        record.remove(source_field);

        let mut items = list.into_iter();
        for column in &family {
            record.insert(column.clone(), items.next().unwrap_or(Value::Null));
        }
        out.push_row(record);
    }

    info!(field = source_field, width, rows = out.len(), "expanded list into indexed columns");
    Ok(out)
}
