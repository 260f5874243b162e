use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::trace;

use crate::protocol::Response;

/// Controller-owned table of outstanding requests.
///
/// Entries are inserted before the request is sent and removed exactly once,
/// at the first response carrying a matching id. A response with no matching
/// entry is dropped silently; there is no caller left to notify.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<u64, oneshot::Sender<Response>>>,
}

impl PendingTable {
    pub(crate) fn register(&self, id: u64) -> oneshot::Receiver<Response> {
        let (sender, receiver) = oneshot::channel();
        self.lock().insert(id, sender);
        receiver
    }

    pub(crate) fn resolve(&self, response: Response) {
        let Some(sender) = self.lock().remove(&response.id) else {
            trace!(id = response.id, "dropping response with no pending request");
            return;
        };
        // The caller may have gone away; nothing to do then.
        let _ = sender.send(response);
    }

    /// Forget an entry whose request never made it onto the channel.
    pub(crate) fn discard(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Drop every outstanding entry so parked callers observe channel death.
    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Response>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
