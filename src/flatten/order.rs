use crate::flatten::expand::column_index;
use crate::types::Table;
use std::collections::HashSet;

/// One position in a canonical column layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSlot {
    /// A single named column
    Named(String),
    /// Every `<prefix>_<i>` column, ascending by `i`
    Indexed(String),
    /// Every column starting with the prefix, in table order
    Prefixed(String),
    /// Every column not placed by an earlier slot, in table order
    Remaining,
}

/// Ordered list of slots describing a table's final column layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalOrder {
    slots: Vec<ColumnSlot>,
}

impl CanonicalOrder {
    pub fn new() -> Self {
        CanonicalOrder::default()
    }

    pub fn columns(mut self, names: &[&str]) -> Self {
        self.slots
            .extend(names.iter().map(|n| ColumnSlot::Named(n.to_string())));
        self
    }

    pub fn indexed(mut self, prefix: impl Into<String>) -> Self {
        self.slots.push(ColumnSlot::Indexed(prefix.into()));
        self
    }

    pub fn prefixed(mut self, prefix: impl Into<String>) -> Self {
        self.slots.push(ColumnSlot::Prefixed(prefix.into()));
        self
    }

    pub fn remaining(mut self) -> Self {
        self.slots.push(ColumnSlot::Remaining);
        self
    }

    pub fn slots(&self) -> &[ColumnSlot] {
        &self.slots
    }

    /// Resolve the layout against the columns actually present.
    ///
    /// Only present columns are returned, each at most once; nothing is
    /// synthesized.
    pub fn resolve(&self, present: &[String]) -> Vec<String> {
        let mut placed: HashSet<&str> = HashSet::new();
        let mut resolved = Vec::new();

        for slot in &self.slots {
            let mut matches: Vec<&String> = match slot {
                ColumnSlot::Named(name) => present.iter().filter(|c| *c == name).collect(),
                ColumnSlot::Indexed(prefix) => present
                    .iter()
                    .filter(|c| column_index(prefix, c).is_some())
                    .collect(),
                ColumnSlot::Prefixed(prefix) => present
                    .iter()
                    .filter(|c| c.starts_with(prefix.as_str()))
                    .collect(),
                ColumnSlot::Remaining => present.iter().collect(),
            };
            if let ColumnSlot::Indexed(prefix) = slot {
                matches.sort_by_key(|c| column_index(prefix, c));
            }

            for column in matches {
                if placed.insert(column.as_str()) {
                    resolved.push(column.clone());
                }
            }
        }
        resolved
    }
}

/// Project a table onto a canonical order.
///
/// Columns the order does not place are dropped; row order and values are
/// unchanged.
pub fn reorder(table: &Table, order: &CanonicalOrder) -> Table {
    let columns = order.resolve(table.columns());
    let mut out = Table::with_columns(columns);
    for row in table.rows() {
        out.push_row(row.clone());
    }
    out
}
