//! Client Registry (§4.4): maps a connected client id to its delivery
//! handle. Owned exclusively by the Dispatcher task.

use std::collections::BTreeMap;

use tokio::sync::mpsc;

/// A handle to a live client's delivery inbox. Dropping the last clone
/// closes the inbox, which the delivery task observes as end-of-input and
/// responds to by closing the socket.
#[derive(Clone)]
pub struct ClientHandle {
    inbox: mpsc::Sender<String>,
}

impl ClientHandle {
    pub fn new(inbox: mpsc::Sender<String>) -> Self {
        ClientHandle { inbox }
    }

    /// Hand `raw_line` to the client's delivery task. Blocks the caller if
    /// the inbox is full (§4.6 — intentional head-of-line blocking).
    pub async fn offer(&self, raw_line: String) -> Result<(), String> {
        self.inbox.send(raw_line).await.map_err(raw_line_of)
    }
}

// `send` returns the un-sent value on failure, wrapped in `SendError`.
fn raw_line_of(err: mpsc::error::SendError<String>) -> String {
    err.0
}

pub struct ClientRegistry {
    clients: BTreeMap<u64, (u64, ClientHandle)>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        ClientRegistry {
            clients: BTreeMap::new(),
        }
    }

    /// Insert or overwrite the session for `client_id` at the given `epoch`
    /// (a value unique per accepted connection, assigned by the listener).
    /// If an older session exists, dropping its handle here closes that
    /// session's inbox, terminating its delivery task.
    pub fn register(&mut self, client_id: u64, epoch: u64, handle: ClientHandle) {
        self.clients.insert(client_id, (epoch, handle));
    }

    /// Remove the session for `client_id` unconditionally, closing its
    /// inbox. Used when the Dispatcher itself observes a failure against the
    /// currently registered handle (no supersession race is possible there,
    /// since the Dispatcher processes one message at a time).
    pub fn deregister(&mut self, client_id: u64) {
        self.clients.remove(&client_id);
    }

    /// Remove the session for `client_id` only if it is still at `epoch`.
    /// A disconnect notification from a superseded session arrives after a
    /// newer session has already registered under the same `client_id`; in
    /// that case the epoch no longer matches and this is a no-op, leaving
    /// the live session's handle in place.
    pub fn deregister_if_current(&mut self, client_id: u64, epoch: u64) {
        if self.clients.get(&client_id).is_some_and(|(current, _)| *current == epoch) {
            self.clients.remove(&client_id);
        }
    }

    pub fn lookup(&self, client_id: u64) -> Option<&ClientHandle> {
        self.clients.get(&client_id).map(|(_, handle)| handle)
    }

    /// All connected clients, in ascending id order (§4.5 — deterministic
    /// recipient enumeration).
    pub fn snapshot(&self) -> impl Iterator<Item = (u64, &ClientHandle)> {
        self.clients.iter().map(|(id, (_, handle))| (*id, handle))
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
