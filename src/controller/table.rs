use async_trait::async_trait;

use crate::error::BridgeError;
use crate::protocol::RunMetadata;
use crate::value::{Row, SqlValue};

use super::{Database, SqlExecutor};

/// Lightweight view binding the data operations to one table.
///
/// Pure convenience over the parent [`Database`]; it holds no runtime state
/// of its own.
pub struct TableRef {
    db: Database,
    name: String,
}

impl TableRef {
    pub(crate) fn new(db: Database, name: String) -> Self {
        Self { db, name }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), BridgeError> {
        self.db.execute(sql, params).await
    }

    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, BridgeError> {
        self.db.query(sql, params).await
    }

    pub async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunMetadata, BridgeError> {
        self.db.run(sql, params).await
    }

    /// Row count of the table.
    ///
    /// # Errors
    /// Returns [`BridgeError`] if the table does not exist or the count query
    /// fails.
    pub async fn count(&self) -> Result<u64, BridgeError> {
        let sql = format!("SELECT COUNT(*) AS cnt FROM {}", quote_identifier(&self.name));
        let rows = self.db.query(&sql, &[]).await?;
        rows.first()
            .and_then(|row| row.get("cnt"))
            .and_then(SqlValue::as_int)
            .map(|count| u64::try_from(*count).unwrap_or_default())
            .ok_or_else(|| BridgeError::ExecutionError("COUNT(*) returned no usable value".into()))
    }

    /// Whether a table with this name exists.
    ///
    /// # Errors
    /// Returns [`BridgeError`] if the catalog query fails.
    pub async fn exists(&self) -> Result<bool, BridgeError> {
        let rows = self
            .db
            .query(
                "SELECT COUNT(*) AS cnt FROM sqlite_master WHERE type = 'table' AND name = ?1",
                &[SqlValue::Text(self.name.clone())],
            )
            .await?;
        let count = rows
            .first()
            .and_then(|row| row.get("cnt"))
            .and_then(SqlValue::as_int)
            .copied()
            .unwrap_or_default();
        Ok(count > 0)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl SqlExecutor for TableRef {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), BridgeError> {
        TableRef::execute(self, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, BridgeError> {
        TableRef::query(self, sql, params).await
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunMetadata, BridgeError> {
        TableRef::run(self, sql, params).await
    }
}
