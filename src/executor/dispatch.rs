use std::sync::mpsc::Receiver;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

use crate::error::BridgeError;
use crate::protocol::{Operation, Payload, Request, Response};
use crate::value;

use super::engine;
use super::state::ConnectionState;

/// Executor entry point: announce readiness, then dispatch requests one at a
/// time, in arrival order.
///
/// The single-threaded loop is what serializes engine access; pipelined
/// requests from the controller still execute strictly in send order. Every
/// failure is converted into an error response at this boundary, so nothing
/// can kill the loop or leave a request unanswered while the channel lives.
pub(crate) fn run_executor(
    origin: u64,
    requests: Receiver<Request>,
    responses: UnboundedSender<Response>,
) {
    let mut state = ConnectionState::default();
    if responses.send(Response::ready()).is_err() {
        return;
    }
    while let Ok(request) = requests.recv() {
        let id = request.id;
        trace!(id, kind = request.op.kind(), "dispatching request");
        let response = match handle(origin, &mut state, request) {
            Ok(results) => Response::success(id, results),
            Err(err) => Response::failure(id, &err),
        };
        if responses.send(response).is_err() {
            break;
        }
    }
    state.shutdown();
    debug!("executor loop finished");
}

/// Reject requests whose origin token does not match the channel's own.
fn handle(
    origin: u64,
    state: &mut ConnectionState,
    request: Request,
) -> Result<Option<Payload>, BridgeError> {
    if request.origin != origin {
        return Err(BridgeError::OriginMismatch(format!(
            "request {} carries origin token {}, executor expects {origin}",
            request.id, request.origin
        )));
    }
    dispatch(state, request.op)
}

fn dispatch(state: &mut ConnectionState, op: Operation) -> Result<Option<Payload>, BridgeError> {
    match op {
        Operation::Initialize { config } => {
            state.initialize(config)?;
            Ok(None)
        }
        Operation::Open { filename } => {
            state.open(&filename)?;
            Ok(None)
        }
        Operation::Execute { sql, params } => {
            trace_sql(state, &sql);
            engine::execute(state.conn()?, &sql, &params)?;
            Ok(None)
        }
        Operation::Query { sql, params } => {
            trace_sql(state, &sql);
            let mut rows = engine::query(state.conn()?, &sql, &params)?;
            if state.parse_json_text() {
                value::reinterpret_json_text(&mut rows);
            }
            Ok(Some(Payload::Rows(rows)))
        }
        Operation::Run { sql, params } => {
            trace_sql(state, &sql);
            let metadata = engine::run(state.conn()?, &sql, &params)?;
            Ok(Some(Payload::Run(metadata)))
        }
        Operation::Export => Ok(Some(Payload::Blob(state.export_snapshot()?))),
        Operation::Import { filename, data } => {
            state.import_file(&filename, &data)?;
            Ok(None)
        }
        Operation::Close => {
            state.close()?;
            Ok(None)
        }
        Operation::Delete => {
            state.delete()?;
            Ok(None)
        }
    }
}

fn trace_sql(state: &ConnectionState, sql: &str) {
    if state.sql_trace() {
        trace!(sql, "executing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::value::SqlValue;
    use tempfile::tempdir;

    fn op_execute(sql: &str) -> Operation {
        Operation::Execute {
            sql: sql.into(),
            params: vec![],
        }
    }

    fn op_query(sql: &str) -> Operation {
        Operation::Query {
            sql: sql.into(),
            params: vec![],
        }
    }

    fn opened_memory_state() -> ConnectionState {
        let mut state = ConnectionState::default();
        dispatch(
            &mut state,
            Operation::Initialize {
                config: DbConfig::in_memory(),
            },
        )
        .unwrap();
        dispatch(
            &mut state,
            Operation::Open {
                filename: ":memory:".into(),
            },
        )
        .unwrap();
        state
    }

    #[test]
    fn data_operations_require_open() {
        let mut state = ConnectionState::default();
        let err = dispatch(&mut state, op_execute("SELECT 1")).unwrap_err();
        assert!(matches!(err, BridgeError::NotOpen(_)));
        let err = dispatch(&mut state, op_query("SELECT 1")).unwrap_err();
        assert!(matches!(err, BridgeError::NotOpen(_)));
    }

    #[test]
    fn reinitializing_installed_state_is_an_error() {
        let mut state = opened_memory_state();
        let err = dispatch(
            &mut state,
            Operation::Initialize {
                config: DbConfig::in_memory(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::AlreadyInitialized(_)));
    }

    #[test]
    fn close_clears_state_and_rejects_double_close() {
        let mut state = opened_memory_state();
        dispatch(&mut state, Operation::Close).unwrap();
        let err = dispatch(&mut state, Operation::Close).unwrap_err();
        assert!(matches!(err, BridgeError::NotOpen(_)));
        let err = dispatch(&mut state, op_execute("SELECT 1")).unwrap_err();
        assert!(matches!(err, BridgeError::NotOpen(_)));
    }

    #[test]
    fn export_is_unsupported_for_memory_storage() {
        let mut state = opened_memory_state();
        let err = dispatch(&mut state, Operation::Export).unwrap_err();
        assert!(matches!(err, BridgeError::Unsupported(_)));
    }

    #[test]
    fn pragma_failure_aborts_open_and_later_settings() {
        let dir = tempdir().unwrap();
        let mut state = ConnectionState::default();
        let config = DbConfig::new("broken.db")
            .with_pool_dir(dir.path())
            .pragma("journal_mode", "no such mode")
            .pragma("user_version", 7);
        dispatch(&mut state, Operation::Initialize { config }).unwrap();
        let err = dispatch(
            &mut state,
            Operation::Open {
                filename: "broken.db".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::ExecutionError(_)));
        // Open failed, so the state still reports not open.
        let err = dispatch(&mut state, op_query("SELECT 1")).unwrap_err();
        assert!(matches!(err, BridgeError::NotOpen(_)));
    }

    #[test]
    fn pragmas_apply_in_configured_order() {
        let mut state = ConnectionState::default();
        let config = DbConfig::in_memory()
            .pragma("user_version", 3)
            .pragma("user_version", 9);
        dispatch(&mut state, Operation::Initialize { config }).unwrap();
        dispatch(
            &mut state,
            Operation::Open {
                filename: ":memory:".into(),
            },
        )
        .unwrap();
        let rows = match dispatch(&mut state, op_query("PRAGMA user_version")).unwrap() {
            Some(Payload::Rows(rows)) => rows,
            other => panic!("expected rows, got {other:?}"),
        };
        assert_eq!(rows[0].get_by_index(0), Some(&SqlValue::Integer(9)));
    }

    #[test]
    fn origin_mismatch_is_rejected_before_dispatch() {
        let mut state = opened_memory_state();
        let request = Request {
            id: 1,
            origin: 99,
            op: op_execute("CREATE TABLE t (x)"),
        };
        let err = handle(7, &mut state, request).unwrap_err();
        assert!(matches!(err, BridgeError::OriginMismatch(_)));
        // The operation was not acted upon.
        let rows = match dispatch(
            &mut state,
            op_query("SELECT COUNT(*) AS cnt FROM sqlite_master WHERE name = 't'"),
        )
        .unwrap()
        {
            Some(Payload::Rows(rows)) => rows,
            other => panic!("expected rows, got {other:?}"),
        };
        assert_eq!(rows[0].get("cnt"), Some(&SqlValue::Integer(0)));
    }

    #[test]
    fn delete_without_open_connection_is_safe() {
        let dir = tempdir().unwrap();
        let mut state = ConnectionState::default();
        let config = DbConfig::new("session.db").with_pool_dir(dir.path());
        dispatch(&mut state, Operation::Initialize { config }).unwrap();
        dispatch(
            &mut state,
            Operation::Import {
                filename: "leftover.db".into(),
                data: b"stale".to_vec(),
            },
        )
        .unwrap();
        dispatch(&mut state, Operation::Delete).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
