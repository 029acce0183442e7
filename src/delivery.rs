//! Client Delivery (§4.6): one task per connected client, writing dequeued
//! `raw_line` bytes to the client's socket in order. A write failure closes
//! the socket and tells the Dispatcher to deregister the client; it never
//! affects other clients.

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default inbox capacity (§4.6 / §5): a full inbox blocks the Dispatcher.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Create a delivery task for `client_id`, returning the sender half that
/// the Dispatcher hands to the [`crate::registry::ClientRegistry`] and a
/// channel the caller can await to learn when the client has disconnected
/// (write failure or the inbox being closed/superseded).
pub fn spawn(
    client_id: u64,
    mut socket: OwnedWriteHalf,
    capacity: usize,
) -> (mpsc::Sender<String>, mpsc::Receiver<u64>) {
    let (tx, mut rx) = mpsc::channel::<String>(capacity);
    let (done_tx, done_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        while let Some(raw_line) = rx.recv().await {
            if let Err(e) = socket.write_all(raw_line.as_bytes()).await {
                warn!(client_id, error = %e, "client write failed, closing connection");
                break;
            }
        }
        let _ = socket.shutdown().await;
        debug!(client_id, "client delivery task exiting");
        let _ = done_tx.send(client_id).await;
    });

    (tx, done_rx)
}
