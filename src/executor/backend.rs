use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::debug;

use crate::config::{PoolConfig, StorageKind};
use crate::error::BridgeError;

/// Installed storage backend.
///
/// Export/import capability differs per variant and is probed on use; a
/// backend without the capability answers with an explicit unsupported error
/// instead of attempting the operation and failing generically.
pub(crate) enum StorageBackend {
    PoolFile(FilePool),
    DirectFile,
    Memory,
}

impl StorageBackend {
    pub(crate) fn install(kind: &StorageKind) -> Result<Self, BridgeError> {
        match kind {
            StorageKind::PoolFile { pool } => FilePool::install(pool).map(Self::PoolFile),
            StorageKind::DirectFile => Ok(Self::DirectFile),
            StorageKind::Memory => Ok(Self::Memory),
        }
    }

    /// Open (creating if absent) the named database through this backend.
    pub(crate) fn open(&self, filename: &str) -> Result<Connection, BridgeError> {
        match self {
            Self::PoolFile(pool) => pool.open(filename),
            Self::DirectFile => Connection::open(filename).map_err(BridgeError::from),
            Self::Memory => Connection::open_in_memory().map_err(BridgeError::from),
        }
    }

    pub(crate) fn supports_export(&self) -> bool {
        matches!(self, Self::PoolFile(_))
    }

    pub(crate) fn export_file(&self, filename: &str) -> Result<Vec<u8>, BridgeError> {
        match self {
            Self::PoolFile(pool) => pool.export_file(filename),
            Self::DirectFile | Self::Memory => Err(unsupported("export")),
        }
    }

    pub(crate) fn import_file(&self, filename: &str, data: &[u8]) -> Result<(), BridgeError> {
        match self {
            Self::PoolFile(pool) => pool.import_file(filename, data),
            Self::DirectFile | Self::Memory => Err(unsupported("import")),
        }
    }

    /// Remove everything this backend persisted.
    pub(crate) fn wipe(&self, filename: &str) -> Result<(), BridgeError> {
        match self {
            Self::PoolFile(pool) => pool.wipe(),
            Self::DirectFile => wipe_direct(filename),
            Self::Memory => Ok(()),
        }
    }
}

fn unsupported(operation: &str) -> BridgeError {
    BridgeError::Unsupported(format!(
        "{operation} is not supported for this storage mode"
    ))
}

/// Pool of database files under one managed directory.
pub(crate) struct FilePool {
    dir: PathBuf,
    capacity: usize,
}

impl FilePool {
    fn install(config: &PoolConfig) -> Result<Self, BridgeError> {
        fs::create_dir_all(&config.dir)
            .map_err(|err| storage_err("creating pool directory", &config.dir, &err))?;
        let pool = Self {
            dir: config.dir.clone(),
            capacity: config.capacity,
        };
        if config.clear_on_init {
            pool.wipe()?;
        }
        debug!(dir = %pool.dir.display(), capacity = pool.capacity, "file pool installed");
        Ok(pool)
    }

    fn open(&self, filename: &str) -> Result<Connection, BridgeError> {
        let path = self.resolve(filename)?;
        if !path.exists() {
            self.ensure_capacity()?;
        }
        Connection::open(path).map_err(BridgeError::from)
    }

    fn export_file(&self, filename: &str) -> Result<Vec<u8>, BridgeError> {
        let path = self.resolve(filename)?;
        fs::read(&path).map_err(|err| storage_err("reading database file", &path, &err))
    }

    fn import_file(&self, filename: &str, data: &[u8]) -> Result<(), BridgeError> {
        let path = self.resolve(filename)?;
        if !path.exists() {
            self.ensure_capacity()?;
        }
        fs::write(&path, data).map_err(|err| storage_err("writing database file", &path, &err))
    }

    fn wipe(&self) -> Result<(), BridgeError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(storage_err("reading pool directory", &self.dir, &err)),
        };
        for entry in entries {
            let entry = entry.map_err(|err| storage_err("reading pool directory", &self.dir, &err))?;
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path)
                    .map_err(|err| storage_err("removing pool file", &path, &err))?;
            }
        }
        debug!(dir = %self.dir.display(), "file pool wiped");
        Ok(())
    }

    /// Pool database names must be plain file names, never paths.
    fn resolve(&self, filename: &str) -> Result<PathBuf, BridgeError> {
        let candidate = Path::new(filename);
        if filename.is_empty() || candidate.file_name() != Some(OsStr::new(filename)) {
            return Err(BridgeError::ConfigError(format!(
                "invalid pool database name: {filename:?}"
            )));
        }
        Ok(self.dir.join(filename))
    }

    fn ensure_capacity(&self) -> Result<(), BridgeError> {
        if self.capacity == 0 {
            return Ok(());
        }
        let held = self.database_count()?;
        if held >= self.capacity {
            return Err(BridgeError::StorageError(format!(
                "pool capacity exhausted ({held}/{} databases)",
                self.capacity
            )));
        }
        Ok(())
    }

    /// Databases currently held, excluding WAL and shm side files.
    fn database_count(&self) -> Result<usize, BridgeError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|err| storage_err("reading pool directory", &self.dir, &err))?;
        let mut held = 0;
        for entry in entries {
            let entry = entry.map_err(|err| storage_err("reading pool directory", &self.dir, &err))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if entry.path().is_file() && !name.ends_with("-wal") && !name.ends_with("-shm") {
                held += 1;
            }
        }
        Ok(held)
    }
}

fn wipe_direct(filename: &str) -> Result<(), BridgeError> {
    for path in [
        filename.to_owned(),
        format!("{filename}-wal"),
        format!("{filename}-shm"),
    ] {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(BridgeError::StorageError(format!(
                    "failed to remove {path}: {err}"
                )));
            }
        }
    }
    Ok(())
}

fn storage_err(action: &str, path: &Path, err: &io::Error) -> BridgeError {
    BridgeError::StorageError(format!("{action} {} failed: {err}", path.display()))
}
