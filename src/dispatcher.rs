//! The Dispatcher (§4.5): single-consumer owner of the Reorder Buffer,
//! Follower Graph, and Client Registry. Consumes parsed events and new
//! client sessions, drains the Reorder Buffer in order, and routes each
//! drained event to its derived recipient set.

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::event::{Event, EventKind};
use crate::graph::FollowerGraph;
use crate::registry::{ClientHandle, ClientRegistry};
use crate::reorder::ReorderBuffer;

/// Everything that can arrive at the Dispatcher's single inbox.
pub enum DispatcherInput {
    /// A line the source connection parsed successfully.
    SourceEvent(Event),
    /// A client completed its hello handshake and is ready to receive.
    /// `epoch` is unique per accepted connection, assigned by the listener.
    NewClient {
        client_id: u64,
        epoch: u64,
        handle: ClientHandle,
    },
    /// A client's delivery task exited (write failure or superseded). Only
    /// removes the registry entry if `epoch` still matches the live
    /// session — a stale disconnect from a superseded session must not
    /// evict the session that replaced it.
    ClientDisconnected { client_id: u64, epoch: u64 },
}

pub struct Dispatcher {
    reorder: ReorderBuffer,
    graph: FollowerGraph,
    registry: ClientRegistry,
}

impl Dispatcher {
    pub fn new(first_sequence_id: u64) -> Self {
        Dispatcher {
            reorder: ReorderBuffer::new(first_sequence_id),
            graph: FollowerGraph::new(),
            registry: ClientRegistry::new(),
        }
    }

    /// Run until the input channel closes or `shutdown` fires.
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<DispatcherInput>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                msg = input.recv() => {
                    match msg {
                        Some(msg) => self.handle_input(msg).await,
                        None => {
                            info!("dispatcher input channel closed, exiting");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("dispatcher received shutdown signal, exiting");
                    break;
                }
            }
        }
    }

    async fn handle_input(&mut self, msg: DispatcherInput) {
        match msg {
            DispatcherInput::SourceEvent(event) => {
                self.reorder.offer(event);
                let drained = self.reorder.drain();
                for event in drained {
                    self.dispatch(event).await;
                }
            }
            DispatcherInput::NewClient {
                client_id,
                epoch,
                handle,
            } => {
                info!(client_id, epoch, "client registered");
                self.registry.register(client_id, epoch, handle);
            }
            DispatcherInput::ClientDisconnected { client_id, epoch } => {
                info!(client_id, epoch, "client disconnected");
                self.registry.deregister_if_current(client_id, epoch);
            }
        }
    }

    /// Mutate the graph (if applicable) and deliver to the derived
    /// recipient set, in ascending client-id order (§4.5).
    async fn dispatch(&mut self, event: Event) {
        match event.kind {
            EventKind::Follow => {
                let (from, to) = (event.from_id.unwrap(), event.to_id.unwrap());
                self.graph.add_follow(from, to);
                self.deliver_to_one(to, &event.raw_line).await;
            }
            EventKind::Unfollow => {
                let (from, to) = (event.from_id.unwrap(), event.to_id.unwrap());
                self.graph.remove_follow(from, to);
                // No notification for unfollow (§4.5 / §9).
            }
            EventKind::Broadcast => {
                self.deliver_to_all(&event.raw_line).await;
            }
            EventKind::PrivateMsg => {
                let to = event.to_id.unwrap();
                self.deliver_to_one(to, &event.raw_line).await;
            }
            EventKind::StatusUpdate => {
                let from = event.from_id.unwrap();
                let recipients: Vec<u64> = self.graph.followers_of(from).collect();
                for client_id in recipients {
                    self.deliver_to_one(client_id, &event.raw_line).await;
                }
            }
        }
    }

    async fn deliver_to_one(&mut self, client_id: u64, raw_line: &str) {
        let disconnected = if let Some(handle) = self.registry.lookup(client_id) {
            handle.offer(raw_line.to_owned()).await.is_err()
        } else {
            false
        };
        if disconnected {
            warn!(client_id, "delivery failed, deregistering");
            self.registry.deregister(client_id);
        }
    }

    async fn deliver_to_all(&mut self, raw_line: &str) {
        let targets: Vec<(u64, ClientHandle)> = self
            .registry
            .snapshot()
            .map(|(id, handle)| (id, handle.clone()))
            .collect();
        let mut failed = Vec::new();
        for (client_id, handle) in targets {
            if handle.offer(raw_line.to_owned()).await.is_err() {
                failed.push(client_id);
            }
        }
        for client_id in failed {
            warn!(client_id, "broadcast delivery failed, deregistering");
            self.registry.deregister(client_id);
        }
    }
}
