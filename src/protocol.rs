//! Wire contract between controller and executor.
//!
//! Every message is plain serializable data. A compatible alternate
//! controller or executor implementation must honor exactly this shape:
//! requests are `{id, origin, kind, ...}` with kind-specific fields,
//! responses are `{id, status, results?, error?}`.

use serde::{Deserialize, Serialize};

use crate::config::DbConfig;
use crate::error::BridgeError;
use crate::value::{Row, SqlValue};

/// Correlation id reserved for the executor's ready handshake. Real request
/// ids start at 1 and are never reused while a response is outstanding.
pub const READY_ID: u64 = 0;

/// Stable error classifiers carried in [`ErrorInfo::code`].
pub mod codes {
    pub const ENGINE: &str = "engine";
    pub const EXECUTION: &str = "execution";
    pub const NOT_OPEN: &str = "not-open";
    pub const ALREADY_INITIALIZED: &str = "already-initialized";
    pub const UNSUPPORTED: &str = "unsupported";
    pub const ORIGIN_MISMATCH: &str = "origin-mismatch";
    pub const STORAGE: &str = "storage";
    pub const CONFIG: &str = "config";
    pub const CONNECTION: &str = "connection";
    pub const OTHER: &str = "other";
}

/// Request envelope sent from controller to executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique and monotonically assigned per controller.
    pub id: u64,
    /// Channel token of the controller this executor was spawned for.
    pub origin: u64,
    /// The operation to perform.
    #[serde(flatten)]
    pub op: Operation,
}

/// The nine operation kinds, matched exhaustively by the executor. Adding a
/// kind is a compile-time-checked change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Operation {
    Initialize { config: DbConfig },
    Open { filename: String },
    Execute { sql: String, params: Vec<SqlValue> },
    Query { sql: String, params: Vec<SqlValue> },
    Run { sql: String, params: Vec<SqlValue> },
    Export,
    Import { filename: String, data: Vec<u8> },
    Close,
    Delete,
}

impl Operation {
    /// Kind tag as it appears on the wire, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Initialize { .. } => "initialize",
            Operation::Open { .. } => "open",
            Operation::Execute { .. } => "execute",
            Operation::Query { .. } => "query",
            Operation::Run { .. } => "run",
            Operation::Export => "export",
            Operation::Import { .. } => "import",
            Operation::Close => "close",
            Operation::Delete => "delete",
        }
    }
}

/// Response envelope sent from executor to controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Id of the originating request; [`READY_ID`] for the handshake.
    pub id: u64,
    pub status: Status,
    /// Present when `status` is `success` and the operation produced data;
    /// unit results omit the field entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Payload>,
    /// Present when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl Response {
    /// The executor's first message, announcing it is accepting requests.
    #[must_use]
    pub fn ready() -> Self {
        Self {
            id: READY_ID,
            status: Status::Ready,
            results: None,
            error: None,
        }
    }

    #[must_use]
    pub fn success(id: u64, results: Option<Payload>) -> Self {
        Self {
            id,
            status: Status::Success,
            results,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: u64, error: &BridgeError) -> Self {
        Self {
            id,
            status: Status::Error,
            results: None,
            error: Some(ErrorInfo::from(error)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Ready,
}

/// Kind-specific success payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Rows(Vec<Row>),
    Run(RunMetadata),
    Blob(Vec<u8>),
}

/// Write-operation metadata reported by `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Present only when `changes` is positive; absent otherwise, never zero
    /// or null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_insert_row_id: Option<i64>,
    /// Rows changed by the most recent statement, as the engine reports it.
    pub changes: u64,
}

/// Structured error crossing the channel.
///
/// `message` carries the engine's text verbatim where applicable; `code` is
/// the stable classifier the controller uses to rebuild a typed error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    /// Rebuild the typed error this info was derived from.
    #[must_use]
    pub fn into_error(self) -> BridgeError {
        match self.code.as_str() {
            codes::NOT_OPEN => BridgeError::NotOpen(self.message),
            codes::ALREADY_INITIALIZED => BridgeError::AlreadyInitialized(self.message),
            codes::UNSUPPORTED => BridgeError::Unsupported(self.message),
            codes::ORIGIN_MISMATCH => BridgeError::OriginMismatch(self.message),
            codes::STORAGE => BridgeError::StorageError(self.message),
            codes::CONFIG => BridgeError::ConfigError(self.message),
            codes::CONNECTION => BridgeError::ConnectionError(self.message),
            codes::ENGINE | codes::EXECUTION => BridgeError::ExecutionError(self.message),
            _ => BridgeError::Other(self.message),
        }
    }
}

impl From<&BridgeError> for ErrorInfo {
    fn from(err: &BridgeError) -> Self {
        let (code, message) = match err {
            BridgeError::SqliteError(engine) => (codes::ENGINE, engine.to_string()),
            BridgeError::NotOpen(m) => (codes::NOT_OPEN, m.clone()),
            BridgeError::AlreadyInitialized(m) => (codes::ALREADY_INITIALIZED, m.clone()),
            BridgeError::Unsupported(m) => (codes::UNSUPPORTED, m.clone()),
            BridgeError::OriginMismatch(m) => (codes::ORIGIN_MISMATCH, m.clone()),
            BridgeError::StorageError(m) => (codes::STORAGE, m.clone()),
            BridgeError::ConfigError(m) => (codes::CONFIG, m.clone()),
            BridgeError::ConnectionError(m) => (codes::CONNECTION, m.clone()),
            BridgeError::ExecutionError(m) => (codes::EXECUTION, m.clone()),
            BridgeError::Other(m) => (codes::OTHER, m.clone()),
        };
        Self {
            code: code.to_owned(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_flat_with_kind_tag() {
        let request = Request {
            id: 3,
            origin: 1,
            op: Operation::Query {
                sql: "SELECT 1".into(),
                params: vec![SqlValue::Integer(9)],
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"id\":3"));
        assert!(json.contains("\"kind\":\"query\""));
        assert!(json.contains("\"sql\":\"SELECT 1\""));

        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 3);
        assert_eq!(back.op.kind(), "query");
    }

    #[test]
    fn unit_success_omits_results_and_error() {
        let response = Response::success(7, None);
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, "{\"id\":7,\"status\":\"success\"}");
    }

    #[test]
    fn error_response_round_trips_typed_error() {
        let original = BridgeError::Unsupported("export is not supported for this storage mode".into());
        let response = Response::failure(4, &original);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"error\""));
        assert!(json.contains("\"code\":\"unsupported\""));

        let back: Response = serde_json::from_str(&json).unwrap();
        let rebuilt = back.error.unwrap().into_error();
        assert!(matches!(rebuilt, BridgeError::Unsupported(_)));
        assert_eq!(
            rebuilt.to_string(),
            "Unsupported capability: export is not supported for this storage mode"
        );
    }

    #[test]
    fn run_metadata_omits_absent_last_insert_row_id() {
        let metadata = RunMetadata {
            last_insert_row_id: None,
            changes: 0,
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, "{\"changes\":0}");

        let with_id = RunMetadata {
            last_insert_row_id: Some(42),
            changes: 1,
        };
        let json = serde_json::to_string(&with_id).unwrap();
        assert!(json.contains("\"last_insert_row_id\":42"));
    }

    #[test]
    fn ready_handshake_uses_reserved_id() {
        let ready = Response::ready();
        assert_eq!(ready.id, READY_ID);
        assert_eq!(ready.status, Status::Ready);
        let json = serde_json::to_string(&ready).unwrap();
        assert_eq!(json, "{\"id\":0,\"status\":\"ready\"}");
    }
}
