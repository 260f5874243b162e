//! Caller-facing half of the bridge.
//!
//! [`Database`] issues operations as correlated requests over the channel and
//! resolves each caller when the matching response arrives. Readiness is
//! implicit: every data operation triggers `ready()` first, so a fresh handle
//! can be queried directly.

mod channel;
mod pending;
mod table;
mod transaction;

pub use table::TableRef;
pub use transaction::Transaction;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DbConfig;
use crate::error::BridgeError;
use crate::protocol::{Operation, RunMetadata};
use crate::value::{Row, SqlValue};

use channel::WorkerChannel;

/// Shared execute/query/run surface implemented by [`Database`],
/// [`Transaction`], and [`TableRef`].
#[async_trait]
pub trait SqlExecutor {
    /// Execute a statement (or a script when `params` is empty), discarding
    /// any produced rows.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), BridgeError>;

    /// Execute a query, returning rows in engine emission order.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, BridgeError>;

    /// Execute a write statement and report run metadata.
    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunMetadata, BridgeError>;
}

/// Handle to one worker-owned database.
///
/// Cloning is cheap and clones share the same executor. The executor and its
/// engine connection start lazily, on the first operation or an explicit
/// [`ready`](Database::ready) call.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    config: DbConfig,
    channel: tokio::sync::Mutex<Option<WorkerChannel>>,
}

impl Database {
    /// Create a handle; nothing is spawned until the first operation.
    #[must_use]
    pub fn new(config: DbConfig) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                config,
                channel: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// The configuration this handle was built with.
    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    /// Start the executor and open the database, if not already done.
    ///
    /// Idempotent. Concurrent callers share a single initialization: the
    /// readiness lock guarantees one executor and one `open` request no
    /// matter how many callers race here. On failure the executor is torn
    /// down and the handle stays usable, so a later call retries from
    /// scratch.
    ///
    /// # Errors
    /// Returns [`BridgeError`] if spawning the executor, installing the
    /// backend, opening the database, or applying a pragma fails.
    pub async fn ready(&self) -> Result<(), BridgeError> {
        self.ensure_ready().await.map(|_| ())
    }

    /// Execute a statement, discarding any produced rows. With no parameters
    /// the SQL may be a multi-statement script.
    ///
    /// # Errors
    /// Returns [`BridgeError`] on readiness or engine failure.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), BridgeError> {
        let channel = self.ensure_ready().await?;
        channel.execute(sql, params).await
    }

    /// Execute a multi-statement script.
    ///
    /// # Errors
    /// Returns [`BridgeError`] on readiness or engine failure.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), BridgeError> {
        self.execute(sql, &[]).await
    }

    /// Execute a query, returning rows in engine emission order. Each row
    /// maps column names to values; when the configuration enables
    /// `parse_json_text`, JSON-looking text cells come back as
    /// [`SqlValue::Json`].
    ///
    /// # Errors
    /// Returns [`BridgeError`] on readiness or engine failure.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, BridgeError> {
        let channel = self.ensure_ready().await?;
        channel.query(sql, params).await
    }

    /// Execute a write statement and report [`RunMetadata`].
    ///
    /// # Errors
    /// Returns [`BridgeError`] on readiness or engine failure.
    pub async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunMetadata, BridgeError> {
        let channel = self.ensure_ready().await?;
        channel.run(sql, params).await
    }

    /// Run `body` inside `BEGIN IMMEDIATE` / `COMMIT`, rolling back when it
    /// errors.
    ///
    /// The original error is re-raised after a successful rollback; a failed
    /// rollback propagates in its place. Nothing coordinates concurrent
    /// transactions on the same database; keeping a single transaction
    /// logically active at a time is the caller's responsibility.
    ///
    /// # Errors
    /// Returns the body's error, or [`BridgeError`] from the transaction
    /// control statements themselves.
    pub async fn transaction<F, Fut, T>(&self, body: F) -> Result<T, BridgeError>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        let channel = self.ensure_ready().await?;
        channel.execute("BEGIN IMMEDIATE", &[]).await?;
        match body(Transaction::new(channel.clone())).await {
            Ok(value) => {
                channel.execute("COMMIT", &[]).await?;
                Ok(value)
            }
            Err(err) => {
                channel.execute("ROLLBACK", &[]).await?;
                Err(err)
            }
        }
    }

    /// Lightweight view binding the data operations to one table.
    #[must_use]
    pub fn table(&self, name: impl Into<String>) -> TableRef {
        TableRef::new(self.clone(), name.into())
    }

    /// Snapshot the whole database as a blob.
    ///
    /// # Errors
    /// Returns [`BridgeError::Unsupported`] when the storage backend has no
    /// export capability, or any readiness/engine failure.
    pub async fn export(&self) -> Result<Vec<u8>, BridgeError> {
        let channel = self.ensure_ready().await?;
        channel.export().await
    }

    /// Store a database snapshot under `filename` in the backend's storage.
    ///
    /// # Errors
    /// Returns [`BridgeError::Unsupported`] when the storage backend has no
    /// import capability, or any readiness/storage failure.
    pub async fn import(&self, filename: &str, data: Vec<u8>) -> Result<(), BridgeError> {
        let channel = self.ensure_ready().await?;
        channel.import(filename, data).await
    }

    /// Close the database and stop the executor.
    ///
    /// A no-op when the executor was never started. The executor is torn
    /// down and readiness reset even when the close request itself fails;
    /// any later data operation re-runs the readiness sequence and re-opens
    /// the same configuration.
    ///
    /// # Errors
    /// Returns [`BridgeError`] if the close request fails; teardown happens
    /// regardless.
    pub async fn close(&self) -> Result<(), BridgeError> {
        let mut guard = self.inner.channel.lock().await;
        let Some(channel) = guard.take() else {
            return Ok(());
        };
        let result = channel.close().await;
        drop(channel);
        result
    }

    /// Delete the database's persisted storage and stop the executor.
    ///
    /// Triggers readiness first when needed, so the backend exists to wipe.
    /// Like [`close`](Database::close), any later data operation re-opens
    /// from scratch.
    ///
    /// # Errors
    /// Returns [`BridgeError`] if readiness or the delete request fails.
    pub async fn delete(&self) -> Result<(), BridgeError> {
        let mut guard = self.inner.channel.lock().await;
        let channel = match guard.take() {
            Some(channel) => channel,
            None => connect_and_open(&self.inner.config).await?,
        };
        let result = channel.delete().await;
        drop(channel);
        result
    }

    async fn ensure_ready(&self) -> Result<WorkerChannel, BridgeError> {
        let mut guard = self.inner.channel.lock().await;
        if let Some(channel) = guard.as_ref() {
            return Ok(channel.clone());
        }
        let channel = connect_and_open(&self.inner.config).await?;
        *guard = Some(channel.clone());
        Ok(channel)
    }

    #[doc(hidden)]
    pub async fn test_request_with_origin(
        &self,
        origin: u64,
        op: Operation,
    ) -> Result<(), BridgeError> {
        let channel = self.ensure_ready().await?;
        channel.request_with_origin(origin, op).await.map(|_| ())
    }
}

/// The readiness sequence: spawn the executor, then initialize and open.
/// Any failure drops the channel, which tears the executor down again.
async fn connect_and_open(config: &DbConfig) -> Result<WorkerChannel, BridgeError> {
    let channel = WorkerChannel::connect(config).await?;
    channel.initialize(config.clone()).await?;
    channel.open(&config.filename).await?;
    Ok(channel)
}

#[async_trait]
impl SqlExecutor for Database {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), BridgeError> {
        Database::execute(self, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, BridgeError> {
        Database::query(self, sql, params).await
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunMetadata, BridgeError> {
        Database::run(self, sql, params).await
    }
}
