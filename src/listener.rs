//! Listener Pair (§4.7): two independent, cancellable accept loops — one
//! feeding the Event Parser from the source connection(s), one completing
//! the client hello handshake and registering sessions with the
//! Dispatcher.

use std::convert::TryFrom;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::delivery;
use crate::dispatcher::DispatcherInput;
use crate::error::ClientHelloError;
use crate::event::Event;
use crate::registry::ClientHandle;

/// Accept source connections and feed parsed events to the Dispatcher.
/// Multiple concurrent source connections are tolerated (§4.7) even though
/// the protocol is single-producer.
pub async fn run_source_listener(
    listener: TcpListener,
    input: mpsc::Sender<DispatcherInput>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!(%addr, "source connection accepted");
                        let input = input.clone();
                        let shutdown = shutdown.resubscribe();
                        tokio::spawn(serve_source_connection(stream, input, shutdown));
                    }
                    Err(e) => {
                        warn!(error = %e, "source listener accept failed");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("source listener shutting down");
                break;
            }
        }
    }
}

async fn serve_source_connection(
    stream: TcpStream,
    input: mpsc::Sender<DispatcherInput>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        match Event::try_from(line.as_str()) {
                            Ok(event) => {
                                if input.send(DispatcherInput::SourceEvent(event)).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => warn!(error = %e, "dropping malformed source line"),
                        }
                    }
                    Ok(None) => {
                        debug!("source connection closed");
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "source connection read error");
                        return;
                    }
                }
            }
            _ = shutdown.recv() => {
                // Drain to EOF before exiting (§4.7).
                while let Ok(Some(_)) = lines.next_line().await {}
                return;
            }
        }
    }
}

/// Accept client connections, complete the hello handshake, and register
/// each session with the Dispatcher.
pub async fn run_client_listener(
    listener: TcpListener,
    input: mpsc::Sender<DispatcherInput>,
    mut shutdown: broadcast::Receiver<()>,
    inbox_capacity: usize,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!(%addr, "client connection accepted");
                        let input = input.clone();
                        tokio::spawn(serve_client_connection(stream, input, inbox_capacity));
                    }
                    Err(e) => {
                        warn!(error = %e, "client listener accept failed");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("client listener shutting down");
                break;
            }
        }
    }
}

/// Unique per accepted client connection, so a disconnect notification can
/// be matched against the session it belongs to rather than just the
/// client id (which a reconnect may reuse while the old session is still
/// tearing down).
fn next_epoch() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

async fn serve_client_connection(
    stream: TcpStream,
    input: mpsc::Sender<DispatcherInput>,
    inbox_capacity: usize,
) {
    let (read_half, write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let hello = match lines.next_line().await {
        Ok(Some(line)) => line,
        Ok(None) => {
            debug!("client disconnected before sending hello");
            return;
        }
        Err(e) => {
            warn!(error = %e, "error reading client hello");
            return;
        }
    };

    let client_id: u64 = match hello.trim().parse() {
        Ok(id) => id,
        Err(_) => {
            let err = ClientHelloError { line: hello };
            warn!(error = %err, "malformed client hello, closing connection");
            return;
        }
    };

    // Further bytes from the client are ignored (§6); the read half is
    // simply dropped rather than polled again.
    drop(lines);

    let epoch = next_epoch();
    let (tx, mut done) = delivery::spawn(client_id, write_half, inbox_capacity);
    let handle = ClientHandle::new(tx);
    if input
        .send(DispatcherInput::NewClient {
            client_id,
            epoch,
            handle,
        })
        .await
        .is_err()
    {
        return;
    }

    if done.recv().await.is_some() {
        let _ = input
            .send(DispatcherInput::ClientDisconnected { client_id, epoch })
            .await;
    }
}
