use async_trait::async_trait;

use crate::error::BridgeError;
use crate::protocol::RunMetadata;
use crate::value::{Row, SqlValue};

use super::channel::WorkerChannel;
use super::SqlExecutor;

/// Data operations scoped to one open transaction.
///
/// Handed to the body of [`Database::transaction`](crate::Database::transaction).
/// Commit and rollback stay with the controller, so the body can only issue
/// data operations, all bound to the same underlying channel.
pub struct Transaction {
    channel: WorkerChannel,
}

impl Transaction {
    pub(crate) fn new(channel: WorkerChannel) -> Self {
        Self { channel }
    }

    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), BridgeError> {
        self.channel.execute(sql, params).await
    }

    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, BridgeError> {
        self.channel.query(sql, params).await
    }

    pub async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunMetadata, BridgeError> {
        self.channel.run(sql, params).await
    }
}

#[async_trait]
impl SqlExecutor for Transaction {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), BridgeError> {
        Transaction::execute(self, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, BridgeError> {
        Transaction::query(self, sql, params).await
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunMetadata, BridgeError> {
        Transaction::run(self, sql, params).await
    }
}
