use thiserror::Error;

/// Errors surfaced by the bridge, on either side of the channel.
///
/// Executor-side failures are converted into error responses at the dispatch
/// boundary and rebuilt into this type by the controller, so the variant an
/// operation rejects with does not depend on which side produced it.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Failure raised by the wrapped engine; message passed through verbatim.
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    /// Operation attempted before `open` succeeded or after `close`/`delete`.
    #[error("Database not open: {0}")]
    NotOpen(String),

    /// `initialize` arrived while connection state was already installed.
    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    /// Export/import requested against a backend lacking the capability.
    #[error("Unsupported capability: {0}")]
    Unsupported(String),

    /// Inbound message carried an origin token the executor does not trust.
    #[error("Origin mismatch: {0}")]
    OriginMismatch(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Channel or executor lifecycle failure.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// Storage backend I/O failure.
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Other bridge error: {0}")]
    Other(String),
}
