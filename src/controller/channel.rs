use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::config::DbConfig;
use crate::error::BridgeError;
use crate::executor;
use crate::protocol::{self, ErrorInfo, Operation, Payload, Request, Response, RunMetadata, Status};
use crate::value::{Row, SqlValue};

use super::pending::PendingTable;

/// Process-wide origin token source; every channel gets a fresh token.
static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

/// One live executor: the request sender, the response pump, and the pending
/// request table.
///
/// Cheap to clone. The executor thread exits when the last clone, and with it
/// the request sender, is dropped; sends after that fail synchronously
/// instead of hanging.
#[derive(Clone)]
pub(crate) struct WorkerChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    sender: mpsc::Sender<Request>,
    pending: Arc<PendingTable>,
    origin: u64,
    next_id: AtomicU64,
}

impl WorkerChannel {
    /// Spawn an executor thread and wait for its ready handshake.
    pub(crate) async fn connect(config: &DbConfig) -> Result<Self, BridgeError> {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (response_tx, response_rx) = tokio::sync::mpsc::unbounded_channel::<Response>();
        let origin = NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::new(PendingTable::default());

        // Register for the handshake before the executor can possibly send it.
        let ready = pending.register(protocol::READY_ID);

        let thread_name = config
            .worker
            .thread_name
            .clone()
            .unwrap_or_else(|| format!("sqlite-bridge-executor-{origin}"));
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || executor::run_executor(origin, request_rx, response_tx))
            .map_err(|err| {
                BridgeError::ConnectionError(format!("failed to spawn executor thread: {err}"))
            })?;

        tokio::spawn(pump_responses(response_rx, Arc::clone(&pending)));

        let channel = Self {
            inner: Arc::new(ChannelInner {
                sender: request_tx,
                pending,
                origin,
                next_id: AtomicU64::new(1),
            }),
        };

        let handshake = ready.await.map_err(|_| {
            BridgeError::ConnectionError("executor exited before signalling ready".into())
        })?;
        if handshake.status != Status::Ready {
            return Err(BridgeError::ConnectionError(
                "executor sent a non-ready first message".into(),
            ));
        }
        Ok(channel)
    }

    /// Correlate one operation: register, send, suspend until the response.
    pub(crate) async fn request(&self, op: Operation) -> Result<Option<Payload>, BridgeError> {
        self.request_with_origin(self.inner.origin, op).await
    }

    pub(crate) async fn request_with_origin(
        &self,
        origin: u64,
        op: Operation,
    ) -> Result<Option<Payload>, BridgeError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let receiver = self.inner.pending.register(id);
        let request = Request { id, origin, op };
        if self.inner.sender.send(request).is_err() {
            self.inner.pending.discard(id);
            return Err(BridgeError::ConnectionError(
                "executor channel is closed".into(),
            ));
        }
        let response = receiver.await.map_err(|_| {
            BridgeError::ConnectionError("executor stopped before responding".into())
        })?;
        match response.status {
            Status::Success => Ok(response.results),
            Status::Error => Err(response
                .error
                .map_or_else(
                    || BridgeError::Other("executor reported an error without details".into()),
                    ErrorInfo::into_error,
                )),
            Status::Ready => Err(BridgeError::ConnectionError(
                "unexpected ready message after handshake".into(),
            )),
        }
    }

    pub(crate) async fn initialize(&self, config: DbConfig) -> Result<(), BridgeError> {
        self.expect_unit(Operation::Initialize { config }).await
    }

    pub(crate) async fn open(&self, filename: &str) -> Result<(), BridgeError> {
        self.expect_unit(Operation::Open {
            filename: filename.to_owned(),
        })
        .await
    }

    pub(crate) async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), BridgeError> {
        self.expect_unit(Operation::Execute {
            sql: sql.to_owned(),
            params: params.to_vec(),
        })
        .await
    }

    pub(crate) async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Row>, BridgeError> {
        match self
            .request(Operation::Query {
                sql: sql.to_owned(),
                params: params.to_vec(),
            })
            .await?
        {
            Some(Payload::Rows(rows)) => Ok(rows),
            other => Err(unexpected_payload("query", other)),
        }
    }

    pub(crate) async fn run(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<RunMetadata, BridgeError> {
        match self
            .request(Operation::Run {
                sql: sql.to_owned(),
                params: params.to_vec(),
            })
            .await?
        {
            Some(Payload::Run(metadata)) => Ok(metadata),
            other => Err(unexpected_payload("run", other)),
        }
    }

    pub(crate) async fn export(&self) -> Result<Vec<u8>, BridgeError> {
        match self.request(Operation::Export).await? {
            Some(Payload::Blob(data)) => Ok(data),
            other => Err(unexpected_payload("export", other)),
        }
    }

    pub(crate) async fn import(&self, filename: &str, data: Vec<u8>) -> Result<(), BridgeError> {
        self.expect_unit(Operation::Import {
            filename: filename.to_owned(),
            data,
        })
        .await
    }

    pub(crate) async fn close(&self) -> Result<(), BridgeError> {
        self.expect_unit(Operation::Close).await
    }

    pub(crate) async fn delete(&self) -> Result<(), BridgeError> {
        self.expect_unit(Operation::Delete).await
    }

    async fn expect_unit(&self, op: Operation) -> Result<(), BridgeError> {
        let kind = op.kind();
        match self.request(op).await? {
            None => Ok(()),
            other => Err(unexpected_payload(kind, other)),
        }
    }
}

fn unexpected_payload(kind: &str, payload: Option<Payload>) -> BridgeError {
    BridgeError::ConnectionError(format!(
        "executor answered {kind} with an unexpected payload: {payload:?}"
    ))
}

/// Deliver responses to their pending entries until the executor goes away,
/// then wake every parked caller with a channel error.
async fn pump_responses(mut responses: UnboundedReceiver<Response>, pending: Arc<PendingTable>) {
    while let Some(response) = responses.recv().await {
        pending.resolve(response);
    }
    debug!("executor response channel closed; clearing pending requests");
    pending.clear();
}
