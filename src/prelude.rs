//! Convenient imports for common functionality.

pub use crate::config::{DbConfig, PoolConfig, PragmaValue, StorageKind};
pub use crate::controller::{Database, SqlExecutor, TableRef, Transaction};
pub use crate::error::BridgeError;
pub use crate::protocol::RunMetadata;
pub use crate::value::{Row, SqlValue};
