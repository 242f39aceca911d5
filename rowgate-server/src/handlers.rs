//! Built-in action handlers over the store adapter.
//!
//! Store failures are reported to the peer as an `"Error: ..."` string in
//! the result value, mirroring the invalid-action shape; they never tear
//! down the server.

use crate::dispatcher::Dispatcher;
use rowgate_store::Store;
use serde_json::{json, Value};
use std::sync::Arc;

/// Registers the `read_table` and `insert` actions.
pub fn register_builtin(dispatcher: &mut Dispatcher, store: Arc<dyn Store>) {
    let read_store = Arc::clone(&store);
    dispatcher.register(
        "read_table",
        Box::new(move |value| read_table(read_store.as_ref(), value)),
    );
    dispatcher.register(
        "insert",
        Box::new(move |value| insert(store.as_ref(), value)),
    );
}

/// `read_table`: returns every row of the named table as an array of rows.
///
/// The table name may be given directly as a string or wrapped as
/// `{"table": <name>}`.
fn read_table(store: &dyn Store, value: &Value) -> Value {
    let table = match value {
        Value::String(name) => name.as_str(),
        Value::Object(map) => match map.get("table").and_then(Value::as_str) {
            Some(name) => name,
            None => return error_value("read_table value must name a table"),
        },
        _ => return error_value("read_table value must name a table"),
    };

    match store.read_all(table) {
        Ok(rows) => Value::Array(rows.into_iter().map(Value::Array).collect()),
        Err(e) => error_value(&e.to_string()),
    }
}

/// `insert`: adds one row, given `{"table", "columns", "values"}`.
///
/// `columns` and `values` must be parallel arrays; omitted columns are
/// stored as null.
fn insert(store: &dyn Store, value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return error_value("insert value must be an object");
    };
    let Some(table) = map.get("table").and_then(Value::as_str) else {
        return error_value("insert value must name a table");
    };
    let Some(columns) = map.get("columns").and_then(Value::as_array) else {
        return error_value("insert value must list columns");
    };
    let Some(values) = map.get("values").and_then(Value::as_array) else {
        return error_value("insert value must list values");
    };

    let mut names = Vec::with_capacity(columns.len());
    for column in columns {
        match column.as_str() {
            Some(name) => names.push(name.to_string()),
            None => return error_value("insert columns must be strings"),
        }
    }

    match store.insert(table, &names, values) {
        Ok(()) => json!("inserted"),
        Err(e) => error_value(&e.to_string()),
    }
}

fn error_value(detail: &str) -> Value {
    Value::String(format!("Error: {detail}"))
}
