// Adaptation layer over the wrapped engine: statement execution, row
// collection, and run metadata. Nothing above this module touches rusqlite.

use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Connection, Row as EngineRow, ToSql};

use crate::error::BridgeError;
use crate::protocol::RunMetadata;
use crate::value::{Row, SqlValue};

/// Execute a statement, discarding any produced rows. With no parameters the
/// SQL may be a multi-statement script.
pub(crate) fn execute(conn: &Connection, sql: &str, params: &[SqlValue]) -> Result<(), BridgeError> {
    if params.is_empty() {
        conn.execute_batch(sql)?;
        return Ok(());
    }
    let values = to_engine_values(params);
    let refs = values_as_tosql(&values);
    let mut stmt = conn.prepare(sql)?;
    if stmt.column_count() == 0 {
        stmt.execute(&refs[..])?;
    } else {
        let mut rows = stmt.query(&refs[..])?;
        while rows.next()?.is_some() {}
    }
    Ok(())
}

/// Execute a query, collecting every row in engine emission order.
pub(crate) fn query(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
) -> Result<Vec<Row>, BridgeError> {
    let values = to_engine_values(params);
    let refs = values_as_tosql(&values);
    let mut stmt = conn.prepare(sql)?;
    let columns: Arc<Vec<String>> = Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    );
    let mut produced = stmt.query(&refs[..])?;
    let mut rows = Vec::new();
    while let Some(engine_row) = produced.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            cells.push(extract_value(engine_row, index)?);
        }
        rows.push(Row::new(Arc::clone(&columns), cells));
    }
    Ok(rows)
}

/// Execute a write statement and read back run metadata. The last-insert id
/// is consulted only when the engine reports a positive change count.
pub(crate) fn run(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
) -> Result<RunMetadata, BridgeError> {
    execute(conn, sql, params)?;
    let changes = conn.changes();
    let last_insert_row_id = (changes > 0).then(|| conn.last_insert_rowid());
    Ok(RunMetadata {
        last_insert_row_id,
        changes,
    })
}

fn extract_value(row: &EngineRow<'_>, index: usize) -> Result<SqlValue, BridgeError> {
    let value: Value = row.get(index).map_err(BridgeError::SqliteError)?;
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Real(f) => SqlValue::Real(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    })
}

fn to_engine_values(params: &[SqlValue]) -> Vec<Value> {
    params.iter().map(to_engine_value).collect()
}

fn to_engine_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        SqlValue::Json(json) => Value::Text(json.to_string()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

fn values_as_tosql(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|value| value as &dyn ToSql).collect()
}
