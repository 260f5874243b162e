use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values bound as statement parameters or produced in query results.
///
/// `Bool`, `Timestamp`, and `Json` exist for parameter binding (the engine
/// stores them as integers and text); result cells come back as one of the
/// five native engine types, except that [`SqlValue::Json`] appears when the
/// opt-in reinterpretation pass is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    /// Bound as text in `%F %T%.f` form.
    Timestamp(NaiveDateTime),
    Json(JsonValue),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn as_int(&self) -> Option<&i64> {
        if let SqlValue::Integer(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        if let SqlValue::Real(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Boolean view; integer cells coerce, with 1 as true and 0 as false.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(value) => Some(*value),
            SqlValue::Integer(1) => Some(true),
            SqlValue::Integer(0) => Some(false),
            _ => None,
        }
    }

    /// Timestamp view; text cells in the common engine formats coerce.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(value) => Some(*value),
            SqlValue::Text(text) => {
                if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
                    return Some(dt);
                }
                NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok()
            }
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        if let SqlValue::Json(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// A single result row: column names shared across the result set plus this
/// row's values, in engine column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<SqlValue>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Column names in engine order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.values.get(index)
    }

    /// Value by position.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Values in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Best-effort reinterpretation of JSON-looking text cells.
///
/// Runs as a separate pass after row assembly so it can be disabled or
/// replaced without touching dispatch. A text cell is re-parsed only when its
/// first non-whitespace character is `{` or `[`; on parse failure the
/// original text is kept.
pub(crate) fn reinterpret_json_text(rows: &mut [Row]) {
    for row in rows {
        for value in &mut row.values {
            let SqlValue::Text(text) = value else {
                continue;
            };
            let trimmed = text.trim_start();
            if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
                continue;
            }
            if let Ok(parsed) = serde_json::from_str::<JsonValue>(text) {
                *value = SqlValue::Json(parsed);
            }
        }
    }
}
