use rusqlite::Connection;
use tracing::{debug, trace, warn};

use crate::config::{DbConfig, PragmaSetting};
use crate::error::BridgeError;

use super::backend::StorageBackend;

/// Connection state owned by one executor instance: the live engine handle,
/// the installed storage backend, and the configuration in effect.
///
/// Held as a field of the dispatch loop rather than module state, so
/// independent executors never share anything.
#[derive(Default)]
pub(crate) struct ConnectionState {
    conn: Option<Connection>,
    backend: Option<StorageBackend>,
    config: Option<DbConfig>,
}

impl ConnectionState {
    /// Install the storage backend and retain the merged configuration.
    /// Re-initializing installed state is an error, never a silent overwrite.
    pub(crate) fn initialize(&mut self, config: DbConfig) -> Result<(), BridgeError> {
        if self.backend.is_some() || self.conn.is_some() {
            return Err(BridgeError::AlreadyInitialized(
                "connection state is already installed; close it before re-initializing".into(),
            ));
        }
        self.backend = Some(StorageBackend::install(&config.storage)?);
        self.config = Some(config);
        Ok(())
    }

    /// Open the named database and apply every configured pragma, in order.
    /// A pragma failure aborts the rest and leaves the state not open.
    pub(crate) fn open(&mut self, filename: &str) -> Result<(), BridgeError> {
        if self.conn.is_some() {
            return Err(BridgeError::AlreadyInitialized(
                "a connection is already open".into(),
            ));
        }
        let backend = self.backend.as_ref().ok_or_else(not_initialized)?;
        let config = self.config.as_ref().ok_or_else(not_initialized)?;
        let conn = backend.open(filename)?;
        apply_pragmas(&conn, &config.pragmas)?;
        debug!(filename, "engine connection opened");
        self.conn = Some(conn);
        Ok(())
    }

    pub(crate) fn conn(&self) -> Result<&Connection, BridgeError> {
        self.conn.as_ref().ok_or_else(|| {
            BridgeError::NotOpen("no open connection; open must succeed first".into())
        })
    }

    /// Close the engine connection and clear all connection state, so later
    /// requests correctly see "not open".
    pub(crate) fn close(&mut self) -> Result<(), BridgeError> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| BridgeError::NotOpen("no open connection to close".into()))?;
        close_engine(conn)?;
        self.backend = None;
        self.config = None;
        debug!("engine connection closed, state cleared");
        Ok(())
    }

    /// Close if open, then wipe the backend's persisted files. Safe to call
    /// with no open connection; the pool may hold data from a prior session.
    pub(crate) fn delete(&mut self) -> Result<(), BridgeError> {
        if let Some(conn) = self.conn.take()
            && let Err(err) = close_engine(conn)
        {
            warn!(%err, "close during delete failed; wiping storage anyway");
        }
        let backend = self.backend.take().ok_or_else(not_initialized)?;
        let config = self.config.take().ok_or_else(not_initialized)?;
        backend.wipe(&config.filename)?;
        debug!(filename = %config.filename, "storage wiped");
        Ok(())
    }

    /// Snapshot the whole database as a blob, when the backend supports it.
    pub(crate) fn export_snapshot(&self) -> Result<Vec<u8>, BridgeError> {
        let backend = self.backend.as_ref().ok_or_else(not_initialized)?;
        let config = self.config.as_ref().ok_or_else(not_initialized)?;
        if backend.supports_export() {
            // Fold the WAL into the main file so the snapshot is complete.
            self.conn()?
                .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        }
        backend.export_file(&config.filename)
    }

    pub(crate) fn import_file(&self, filename: &str, data: &[u8]) -> Result<(), BridgeError> {
        let backend = self.backend.as_ref().ok_or_else(not_initialized)?;
        backend.import_file(filename, data)
    }

    pub(crate) fn parse_json_text(&self) -> bool {
        self.config
            .as_ref()
            .is_some_and(|config| config.parse_json_text)
    }

    pub(crate) fn sql_trace(&self) -> bool {
        self.config
            .as_ref()
            .is_some_and(|config| config.logging.sql_trace)
    }

    /// Close the engine on channel teardown; errors are only logged.
    pub(crate) fn shutdown(&mut self) {
        if let Some(conn) = self.conn.take() {
            match close_engine(conn) {
                Ok(()) => debug!("engine connection closed during executor shutdown"),
                Err(err) => warn!(%err, "engine close failed during executor shutdown"),
            }
        }
        self.backend = None;
        self.config = None;
    }
}

fn not_initialized() -> BridgeError {
    BridgeError::NotOpen("executor is not initialized".into())
}

fn apply_pragmas(conn: &Connection, pragmas: &[PragmaSetting]) -> Result<(), BridgeError> {
    for pragma in pragmas {
        conn.execute_batch(&format!("PRAGMA {} = {};", pragma.name, pragma.value))
            .map_err(|err| {
                BridgeError::ExecutionError(format!("applying PRAGMA {} failed: {err}", pragma.name))
            })?;
        trace!(name = %pragma.name, value = %pragma.value, "pragma applied");
    }
    Ok(())
}

fn close_engine(conn: Connection) -> Result<(), BridgeError> {
    conn.close().map_err(|(_conn, err)| BridgeError::SqliteError(err))
}
