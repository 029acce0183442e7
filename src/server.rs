//! Process lifecycle (§4.10): `Server::start`/`Server::stop`, the async
//! Rust translation of the original `followermaze.Start`/`Stop` contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::delivery::DEFAULT_INBOX_CAPACITY;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::listener::{run_client_listener, run_source_listener};

/// A running follower-maze server. Holds the shutdown broadcast sender and
/// the join handles for every spawned task so `stop` can wait for a clean
/// exit.
pub struct Server {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
    stopped: Arc<AtomicBool>,
}

impl Server {
    /// Bind both listeners and spawn the Dispatcher, Listener Pair, and
    /// (implicitly, per connection) Client Delivery tasks.
    pub async fn start(config: Config) -> Result<Self, ServerError> {
        let source_listener =
            TcpListener::bind(&config.source_addr)
                .await
                .map_err(|source| ServerError::Startup {
                    addr: config.source_addr.clone(),
                    source,
                })?;
        let client_listener =
            TcpListener::bind(&config.client_addr)
                .await
                .map_err(|source| ServerError::Startup {
                    addr: config.client_addr.clone(),
                    source,
                })?;

        info!(
            source_addr = %config.source_addr,
            client_addr = %config.client_addr,
            first_sequence_id = config.first_sequence_id,
            "server listeners bound"
        );

        let (shutdown_tx, _) = broadcast::channel(1);
        let (input_tx, input_rx) = mpsc::channel(1024);

        let dispatcher = Dispatcher::new(config.first_sequence_id);
        let dispatcher_task = tokio::spawn(dispatcher.run(input_rx, shutdown_tx.subscribe()));

        let source_task = tokio::spawn(run_source_listener(
            source_listener,
            input_tx.clone(),
            shutdown_tx.subscribe(),
        ));

        let client_task = tokio::spawn(run_client_listener(
            client_listener,
            input_tx,
            shutdown_tx.subscribe(),
            DEFAULT_INBOX_CAPACITY,
        ));

        Ok(Server {
            shutdown_tx,
            tasks: vec![dispatcher_task, source_task, client_task],
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Trigger cancellation and await every spawned task. A second call
    /// returns `AlreadyStopped` without side effects (§5, §7, S5).
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStopped);
        }
        let _ = self.shutdown_tx.send(());
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("server stopped");
        Ok(())
    }
}
