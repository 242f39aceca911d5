//! In-memory store implementation.

use crate::error::StoreError;
use crate::Store;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// In-memory table store.
///
/// Tables hold named columns and positional rows. Reads clone the row data;
/// the interior `RwLock` makes the store safe to share across threads even
/// though the reactor itself is single-threaded.
#[derive(Debug, Default)]
pub struct MemStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) a table with the given column names.
    pub fn create_table<S: AsRef<str>>(&self, name: &str, columns: &[S]) {
        let table = Table {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        };
        self.tables.write().insert(name.to_string(), table);
    }

    /// Returns the names of all tables.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}

impl Store for MemStore {
    fn read_all(&self, table: &str) -> Result<Vec<Vec<Value>>, StoreError> {
        let tables = self.tables.read();
        let table = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(table.rows.clone())
    }

    fn insert(&self, table: &str, columns: &[String], values: &[Value]) -> Result<(), StoreError> {
        if columns.len() != values.len() {
            return Err(StoreError::ColumnMismatch {
                table: table.to_string(),
                reason: format!("{} columns but {} values", columns.len(), values.len()),
            });
        }

        let mut tables = self.tables.write();
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        for column in columns {
            if !entry.columns.contains(column) {
                return Err(StoreError::ColumnMismatch {
                    table: table.to_string(),
                    reason: format!("unknown column \"{column}\""),
                });
            }
        }

        // Row in table-column order; omitted columns are null.
        let row = entry
            .columns
            .iter()
            .map(|column| {
                columns
                    .iter()
                    .position(|c| c == column)
                    .map(|i| values[i].clone())
                    .unwrap_or(Value::Null)
            })
            .collect();
        entry.rows.push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn org_store() -> MemStore {
        let store = MemStore::new();
        store.create_table("organization", &["name", "uni_code", "department_uni_codes"]);
        store
    }

    #[test]
    fn test_read_all_empty_table() {
        let store = org_store();
        assert!(store.read_all("organization").unwrap().is_empty());
    }

    #[test]
    fn test_read_all_unknown_table() {
        let store = org_store();
        let err = store.read_all("missing").unwrap_err();
        assert!(matches!(err, StoreError::TableNotFound(name) if name == "missing"));
    }

    #[test]
    fn test_insert_and_read_back() {
        let store = org_store();
        store
            .insert(
                "organization",
                &["name".into(), "uni_code".into(), "department_uni_codes".into()],
                &[json!("Corp"), json!(12345), json!([12345])],
            )
            .unwrap();

        let rows = store.read_all("organization").unwrap();
        assert_eq!(rows, vec![vec![json!("Corp"), json!(12345), json!([12345])]]);
    }

    #[test]
    fn test_insert_partial_columns_fills_null() {
        let store = org_store();
        store
            .insert("organization", &["name".into()], &[json!("Corp")])
            .unwrap();

        let rows = store.read_all("organization").unwrap();
        assert_eq!(rows, vec![vec![json!("Corp"), Value::Null, Value::Null]]);
    }

    #[test]
    fn test_insert_count_mismatch() {
        let store = org_store();
        let err = store
            .insert("organization", &["name".into()], &[json!("Corp"), json!(1)])
            .unwrap_err();
        assert!(matches!(err, StoreError::ColumnMismatch { .. }));
    }

    #[test]
    fn test_insert_unknown_column() {
        let store = org_store();
        let err = store
            .insert("organization", &["salary".into()], &[json!(100)])
            .unwrap_err();
        assert!(matches!(err, StoreError::ColumnMismatch { .. }));
    }

    #[test]
    fn test_create_table_replaces() {
        let store = org_store();
        store
            .insert("organization", &["name".into()], &[json!("Corp")])
            .unwrap();
        store.create_table("organization", &["name"]);
        assert!(store.read_all("organization").unwrap().is_empty());
    }
}
