//! Promise-style async bridge to a `SQLite` engine owned by a dedicated worker.
//!
//! The crate splits database access across two halves connected by one
//! ordered message channel:
//!
//! - The **controller** ([`Database`]) lives wherever the caller's async code
//!   runs. It assigns a fresh correlation id to every operation, parks the
//!   caller on a oneshot receiver, and resolves it when the matching response
//!   arrives.
//! - The **executor** runs on a dedicated worker thread and is the sole owner
//!   of the live `rusqlite` connection and its storage backend. It decodes
//!   each request, performs it against the engine, and answers with a
//!   response carrying the same id.
//!
//! The engine itself is opaque to this crate: SQL execution, storage, and
//! durability are `rusqlite`'s business. Everything here is the
//! request/response protocol and the lifecycle around it. Requests are
//! dispatched strictly in send order, so pipelined operations resolve in the
//! order they were issued.
//!
//! ```no_run
//! use sqlite_bridge::{Database, DbConfig, SqlValue};
//!
//! # async fn demo() -> Result<(), sqlite_bridge::BridgeError> {
//! let db = Database::new(DbConfig::new("app.db"));
//! // Readiness is implicit: the first operation spawns the executor.
//! db.execute("CREATE TABLE user (id INTEGER PRIMARY KEY, name TEXT)", &[])
//!     .await?;
//! let meta = db
//!     .run("INSERT INTO user (name) VALUES (?1)", &[SqlValue::Text("ada".into())])
//!     .await?;
//! let _rows = db
//!     .query("SELECT name FROM user WHERE id = ?1", &[SqlValue::Integer(
//!         meta.last_insert_row_id.unwrap_or_default(),
//!     )])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod error;
mod executor;
pub mod prelude;
pub mod protocol;
pub mod value;

pub use config::{DbConfig, LoggingConfig, PoolConfig, PragmaSetting, PragmaValue, StorageKind, WorkerConfig};
pub use controller::{Database, SqlExecutor, TableRef, Transaction};
pub use error::BridgeError;
pub use protocol::RunMetadata;
pub use value::{Row, SqlValue};
