//! TCP Server
//!
//! Binds the listener, accepts clients and supervises shutdown.
//!
//! ```text
//!   bind()  ──► TcpListener
//!                   │
//!   run()           ▼
//!   ┌───────────────────────────────┐      ┌──────────────────────┐
//!   │ accept loop                   │      │ shutdown future      │
//!   │  accept() ─► spawn session    │ race │ (termination signal) │
//!   │  accept error ─► return Err   │◄────►│                      │
//!   └───────────────────────────────┘      └──────────────────────┘
//!                   │
//!                   ▼
//!   watch::Sender<bool> = true  ──►  every live session closes
//! ```
//!
//! There is no connection limit and no drain: once shutdown is broadcast,
//! `run` returns and the process exits.

pub mod shutdown;

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::StorageEngine;
use std::future::Future;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub use shutdown::Signals;

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Accepting a connection failed; the accept loop stops
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// Binds a TCP listener on `addr` (e.g. `0.0.0.0:6380`).
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    match listener.local_addr() {
        Ok(local) => info!("Listening on {}", local),
        Err(_) => info!("Listening on {}", addr),
    }

    Ok(listener)
}

/// Serves clients until `shutdown` completes or accepting fails.
///
/// When `shutdown` completes, every live session is told to close its
/// connection and `Ok(())` is returned. An accept error is returned as
/// [`ServerError::Accept`] after doing the same.
pub async fn run(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let stats = Arc::new(ConnectionStats::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let result = tokio::select! {
        res = accept_loop(listener, Arc::clone(&storage), Arc::clone(&stats), shutdown_rx) => res,
        _ = shutdown => {
            info!(
                active_connections = stats.active(),
                "Shutdown signal received, closing connections"
            );
            Ok(())
        }
    };

    // Receivers may all be gone already; nothing to close then.
    let _ = shutdown_tx.send(true);

    let conn = stats.snapshot();
    let storage_stats = storage.stats();
    info!(
        connections = conn.connections_accepted,
        commands = conn.commands_processed,
        bytes_read = conn.bytes_read,
        bytes_written = conn.bytes_written,
        keys = storage_stats.keys,
        get_ops = storage_stats.get_ops,
        set_ops = storage_stats.set_ops,
        misses = storage_stats.misses,
        "Server stopped"
    );

    result
}

/// Accepts connections and spawns one session task per client.
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(client = %addr, "Accepted connection");

                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);
                let shutdown = shutdown.clone();

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats, shutdown).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                return Err(ServerError::Accept(e));
            }
        }
    }
}
