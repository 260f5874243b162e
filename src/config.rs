// Configuration for the bridge.
//
// The configuration is plain serializable data: it crosses the channel inside
// the `initialize` request, so it can never carry callbacks or other
// function-valued fields. Anything that must run inside the executor (SQL
// tracing, log output) is re-declared there from executor-local defaults.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Database slots a file pool provisions when none is configured.
const DEFAULT_POOL_CAPACITY: usize = 6;

/// Complete configuration for one [`Database`](crate::Database).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Database name. Resolved against the pool directory for
    /// [`StorageKind::PoolFile`], used as a plain filesystem path for
    /// [`StorageKind::DirectFile`], ignored by [`StorageKind::Memory`].
    pub filename: String,
    /// Storage backend, selected exclusively by discriminant.
    pub storage: StorageKind,
    /// Engine-level runtime settings, applied in order after every open.
    pub pragmas: Vec<PragmaSetting>,
    /// Re-parse text cells that look like JSON documents. Off by default;
    /// the heuristic can misfire on ordinary text starting with `{` or `[`.
    pub parse_json_text: bool,
    /// Executor thread options.
    pub worker: WorkerConfig,
    /// Executor-side logging options.
    pub logging: LoggingConfig,
}

impl DbConfig {
    /// Configuration for a database opened directly at `filename`.
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            storage: StorageKind::DirectFile,
            pragmas: Vec::new(),
            parse_json_text: false,
            worker: WorkerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Configuration for a purely in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        let mut config = Self::new(":memory:");
        config.storage = StorageKind::Memory;
        config
    }

    /// Select the storage backend.
    #[must_use]
    pub fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    /// Shorthand for a pool-file backend rooted at `dir` with pool defaults.
    #[must_use]
    pub fn with_pool_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.with_storage(StorageKind::PoolFile {
            pool: PoolConfig::new(dir),
        })
    }

    /// Append an engine setting; settings apply in insertion order on open.
    #[must_use]
    pub fn pragma(mut self, name: impl Into<String>, value: impl Into<PragmaValue>) -> Self {
        self.pragmas.push(PragmaSetting {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Enable the opt-in JSON reinterpretation of query results.
    #[must_use]
    pub fn with_parse_json_text(mut self, parse_json_text: bool) -> Self {
        self.parse_json_text = parse_json_text;
        self
    }

    /// Emit every dispatched SQL string at trace level inside the executor.
    #[must_use]
    pub fn with_sql_trace(mut self, sql_trace: bool) -> Self {
        self.logging.sql_trace = sql_trace;
        self
    }

    /// Override the executor thread name.
    #[must_use]
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.worker.thread_name = Some(thread_name.into());
        self
    }
}

/// Storage backend for the engine.
///
/// Export/import capability depends on the variant and is probed by the
/// executor, never assumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StorageKind {
    /// Databases live as regular files under a managed pool directory. The
    /// only backend with export/import capability.
    PoolFile { pool: PoolConfig },
    /// The filename is used as a plain filesystem path.
    DirectFile,
    /// Engine-private memory; nothing is persisted.
    Memory,
}

/// Settings for the pool-file backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Directory holding the pool's database files.
    pub dir: PathBuf,
    /// Maximum number of database files the pool will hold; 0 means
    /// unbounded.
    pub capacity: usize,
    /// Empty the pool directory when the executor installs the backend.
    pub clear_on_init: bool,
}

impl PoolConfig {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            capacity: DEFAULT_POOL_CAPACITY,
            clear_on_init: false,
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_clear_on_init(mut self, clear_on_init: bool) -> Self {
        self.clear_on_init = clear_on_init;
        self
    }
}

/// Executor thread options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name for the executor thread; a per-channel default is derived when
    /// absent.
    pub thread_name: Option<String>,
}

/// Executor-side logging options.
///
/// The executor always logs through `tracing`; these flags only widen what it
/// emits. Custom log sinks cannot cross the channel and are configured on the
/// executor's side of the process via a `tracing` subscriber.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit each dispatched SQL string at trace level.
    pub sql_trace: bool,
}

/// One engine setting, applied as `PRAGMA name = value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PragmaSetting {
    pub name: String,
    pub value: PragmaValue,
}

/// Value side of a pragma assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PragmaValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for PragmaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PragmaValue::Int(value) => write!(f, "{value}"),
            PragmaValue::Bool(value) => write!(f, "{}", i32::from(*value)),
            PragmaValue::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for PragmaValue {
    fn from(value: i64) -> Self {
        PragmaValue::Int(value)
    }
}

impl From<i32> for PragmaValue {
    fn from(value: i32) -> Self {
        PragmaValue::Int(i64::from(value))
    }
}

impl From<bool> for PragmaValue {
    fn from(value: bool) -> Self {
        PragmaValue::Bool(value)
    }
}

impl From<&str> for PragmaValue {
    fn from(value: &str) -> Self {
        PragmaValue::Text(value.to_owned())
    }
}

impl From<String> for PragmaValue {
    fn from(value: String) -> Self {
        PragmaValue::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = DbConfig::new("app.db");
        assert_eq!(config.filename, "app.db");
        assert_eq!(config.storage, StorageKind::DirectFile);
        assert!(config.pragmas.is_empty());
        assert!(!config.parse_json_text);
        assert!(!config.logging.sql_trace);
        assert!(config.worker.thread_name.is_none());
    }

    #[test]
    fn pragmas_keep_insertion_order() {
        let config = DbConfig::in_memory()
            .pragma("journal_mode", "WAL")
            .pragma("busy_timeout", 5000)
            .pragma("foreign_keys", true);
        let rendered: Vec<String> = config
            .pragmas
            .iter()
            .map(|p| format!("{} = {}", p.name, p.value))
            .collect();
        assert_eq!(
            rendered,
            ["journal_mode = WAL", "busy_timeout = 5000", "foreign_keys = 1"]
        );
    }

    #[test]
    fn storage_kind_serializes_with_discriminant_tag() {
        let kind = StorageKind::PoolFile {
            pool: PoolConfig::new("/tmp/pool").with_capacity(2),
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"pool-file\""));

        let direct: StorageKind = serde_json::from_str("{\"type\":\"direct-file\"}").unwrap();
        assert_eq!(direct, StorageKind::DirectFile);
    }
}
