use crate::config::DatabaseConfig;
use crate::error::{EtlError, Result};
use crate::types::{ColumnMapping, Table};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::Value;
use std::borrow::Cow;
use tracing::info;

/// Persistence collaborator: replaces a destination table's full contents
pub trait TableLoader {
    /// Load `table` into `target`, optionally renaming columns first.
    ///
    /// Returns the number of rows written.
    fn load(&mut self, table: &Table, target: &str, mapping: Option<&ColumnMapping>) -> Result<usize>;
}

/// Loads tables into a SQLite database
pub struct SqliteLoader {
    conn: Connection,
    schema: String,
}

impl SqliteLoader {
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let conn = Connection::open(&config.path).map_err(EtlError::database("open"))?;
        Ok(SqliteLoader {
            conn,
            schema: config.schema.clone(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(EtlError::database("open"))?;
        Ok(SqliteLoader {
            conn,
            schema: String::from("main"),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl TableLoader for SqliteLoader {
    fn load(&mut self, table: &Table, target: &str, mapping: Option<&ColumnMapping>) -> Result<usize> {
        let table: Cow<'_, Table> = match mapping {
            Some(m) if !m.is_empty() => Cow::Owned(table.renamed(m)?),
            _ => Cow::Borrowed(table),
        };
        let qualified = format!("{}.{}", quote_ident(&self.schema), quote_ident(target));

        let tx = self.conn.transaction().map_err(EtlError::database("begin"))?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", qualified))
            .map_err(EtlError::database("drop"))?;

        if table.columns().is_empty() {
            tx.commit().map_err(EtlError::database("commit"))?;
            info!(table = %qualified, rows = 0, "loaded table without columns");
            return Ok(0);
        }

        let column_list = table
            .columns()
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute_batch(&format!("CREATE TABLE {} ({});", qualified, column_list))
            .map_err(EtlError::database("create"))?;

        let placeholders = (1..=table.columns().len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    qualified, column_list, placeholders
                ))
                .map_err(EtlError::database("prepare"))?;

            for row in table.rows() {
                let values = table
                    .columns()
                    .iter()
                    .map(|c| sql_value(row.get(c).unwrap_or(&Value::Null)));
                stmt.execute(rusqlite::params_from_iter(values))
                    .map_err(EtlError::database("insert"))?;
            }
        }
        tx.commit().map_err(EtlError::database("commit"))?;

        info!(table = %qualified, rows = table.len(), "loaded table");
        Ok(table.len())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => SqlValue::Integer(i),
            (None, Some(f)) => SqlValue::Real(f),
            (None, None) => SqlValue::Text(n.to_string()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(value: Value) -> Table {
        Table::from_records(serde_json::from_value(value).unwrap())
    }

    fn count(loader: &SqliteLoader, name: &str) -> i64 {
        loader
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", name), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_load_replaces_contents() {
        let mut loader = SqliteLoader::open_in_memory().unwrap();

        let first = table(json!([{"id": 1, "price": 9.99}, {"id": 2, "price": 1.5}]));
        assert_eq!(loader.load(&first, "products", None).unwrap(), 2);

        let second = table(json!([{"id": 3, "title": "new shape"}]));
        assert_eq!(loader.load(&second, "products", None).unwrap(), 1);
        assert_eq!(count(&loader, "products"), 1);

        let title: String = loader
            .connection()
            .query_row("SELECT title FROM products WHERE id = 3", [], |r| r.get(0))
            .unwrap();
        assert_eq!(title, "new shape");
    }

    #[test]
    fn test_load_with_mapping_and_value_types() {
        let mut loader = SqliteLoader::open_in_memory().unwrap();
        let input = table(json!([
            {"id": 1, "meta.barcode": "123", "ok": true, "tags": ["a"], "brand": null}
        ]));
        let mapping = ColumnMapping::new().rename("meta.barcode", "barcode");

        loader.load(&input, "items", Some(&mapping)).unwrap();

        let (barcode, ok, tags, brand): (String, i64, String, Option<String>) = loader
            .connection()
            .query_row("SELECT barcode, ok, tags, brand FROM items", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })
            .unwrap();
        assert_eq!(barcode, "123");
        assert_eq!(ok, 1);
        assert_eq!(tags, r#"["a"]"#);
        assert_eq!(brand, None);
    }

    #[test]
    fn test_colliding_mapping_keeps_previous_table() {
        let mut loader = SqliteLoader::open_in_memory().unwrap();
        let input = table(json!([{"id": 1, "sku": "A", "meta.sku": "B"}]));
        loader.load(&input, "items", None).unwrap();

        let mapping = ColumnMapping::new().rename("meta.sku", "sku");
        let err = loader.load(&input, "items", Some(&mapping)).unwrap_err();
        assert!(matches!(err, EtlError::InvalidConfig(_)));
        assert_eq!(count(&loader, "items"), 1);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("dimensions.width"), "\"dimensions.width\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
