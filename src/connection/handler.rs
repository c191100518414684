//! Connection Handler Module
//!
//! Each client connection is driven by one [`ConnectionHandler`] running in
//! its own task.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │  AWAITING_LINE               │◄────────┐
//!    │  read until a '\n' arrives   │         │
//!    └───────────┬──────────────────┘         │
//!                │                            │
//!                ▼                            │
//!    ┌──────────────────────────────┐         │
//!    │  PROCESSING                  │         │
//!    │  parse, dispatch, respond    │─────────┘
//!    └───────────┬──────────────────┘
//!                │ STOP / EOF / error / shutdown
//!                ▼
//! 3. CLOSED: stream shut down, task ends
//! ```
//!
//! Incoming bytes accumulate in a `BytesMut` buffer. A read can deliver
//! half a line or several lines at once; only complete lines are dispatched,
//! in order.

use crate::commands::CommandHandler;
use crate::protocol::{LineParser, ParseError, Response};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn active(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time copy of the counters.
    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            commands_processed: self.commands_processed.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`ConnectionStats`] for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionSnapshot {
    pub connections_accepted: u64,
    pub active_connections: u64,
    pub commands_processed: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// Why a session ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent STOP
    Stop,
    /// The server is shutting down
    Shutdown,
}

/// Handles a single client connection.
///
/// Generic over the stream so tests can drive it with a mock transport.
pub struct ConnectionHandler<S> {
    /// The client stream, with buffered writes
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shares the store)
    command_handler: CommandHandler,

    /// Line framer
    parser: LineParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Flips to `true` when the server shuts down
    shutdown: watch::Receiver<bool>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: LineParser::new(),
            stats,
            shutdown,
        }
    }

    /// Runs the session until STOP, shutdown, EOF or a transport error,
    /// then closes the stream.
    pub async fn run(mut self) -> Result<CloseReason, ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = if *self.shutdown.borrow() {
            Ok(CloseReason::Shutdown)
        } else {
            self.main_loop().await
        };

        match &result {
            Ok(CloseReason::Stop) => info!(client = %self.addr, "Client sent STOP, closing"),
            Ok(CloseReason::Shutdown) => {
                info!(client = %self.addr, "Closing connection for server shutdown")
            }
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        if let Err(e) = self.stream.shutdown().await {
            trace!(client = %self.addr, error = %e, "Stream shutdown failed");
        }

        self.stats.connection_closed();
        result
    }

    /// The read-dispatch-respond loop.
    async fn main_loop(&mut self) -> Result<CloseReason, ConnectionError> {
        loop {
            while let Some(line) = self.next_line()? {
                let response = self.command_handler.execute(&line);
                self.stats.command_processed();
                trace!(
                    client = %self.addr,
                    line = line.trim_end(),
                    response = %response,
                    "Processed command"
                );

                if response.is_error() {
                    debug!(client = %self.addr, response = %response, "Command rejected");
                }

                if response.closes_session() {
                    return Ok(CloseReason::Stop);
                }

                self.send_response(&response).await?;
            }

            if !self.read_more_data().await? {
                return Ok(CloseReason::Shutdown);
            }
        }
    }

    /// Takes the next complete line off the buffer, if there is one.
    fn next_line(&mut self) -> Result<Option<String>, ConnectionError> {
        match self.parser.parse(&self.buffer) {
            Ok(Some((line, consumed))) => {
                let line = line.to_string();
                let _ = self.buffer.split_to(consumed);
                Ok(Some(line))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ConnectionError::Parse(e)),
        }
    }

    /// Reads more data from the stream into the buffer.
    ///
    /// Returns `false` if the server began shutting down while waiting.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = tokio::select! {
            result = self.stream.get_mut().read_buf(&mut self.buffer) => result?,
            changed = self.shutdown.changed() => {
                if changed.is_err() || *self.shutdown.borrow() {
                    return Ok(false);
                }
                return Ok(true);
            }
        };

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial line in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(true)
    }

    /// Writes one response line and flushes it.
    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input (invalid UTF-8 or an oversized line)
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Client closed the connection between lines
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Stream ended in the middle of a line
    #[error("Unexpected end of stream")]
    UnexpectedEof,
}

/// Handles a client connection.
///
/// Creates a [`ConnectionHandler`] and runs it to completion. Errors are
/// logged by the handler and not propagated.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, shutdown);
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parser::MAX_LINE_SIZE;
    use crate::storage::StorageEngine;
    use std::io;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::io::Builder;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn command_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(StorageEngine::new()))
    }

    async fn run_mock(
        mock: tokio_test::io::Mock,
    ) -> (Result<CloseReason, ConnectionError>, Arc<ConnectionStats>) {
        let stats = Arc::new(ConnectionStats::new());
        let (_tx, rx) = watch::channel(false);
        let handler =
            ConnectionHandler::new(mock, test_addr(), command_handler(), Arc::clone(&stats), rx);
        (handler.run().await, stats)
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let mock = Builder::new().read(b"PING\n").write(b"PONG\n").build();

        let (result, _) = run_mock(mock).await;
        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
    }

    #[tokio::test]
    async fn test_stop_closes_without_reply() {
        let mock = Builder::new()
            .read(b"PING\nSTOP\nGET never\n")
            .write(b"PONG\n")
            .build();

        let (result, stats) = run_mock(mock).await;
        assert_eq!(result.unwrap(), CloseReason::Stop);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.active(), 0);
    }

    #[tokio::test]
    async fn test_pipelined_lines() {
        let mock = Builder::new()
            .read(b"SET a 1\nGET a\nGET b\n")
            .write(b"OK\n")
            .write(b"1\n")
            .write(b"\n")
            .build();

        let (result, stats) = run_mock(mock).await;
        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 3);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 6);
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let mock = Builder::new()
            .read(b"EC")
            .read(b"HO hello ")
            .read(b"world\r\n")
            .write(b"echo: \"hello world\"\n")
            .build();

        let (result, _) = run_mock(mock).await;
        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
    }

    #[tokio::test]
    async fn test_errors_keep_session_open() {
        let mock = Builder::new()
            .read(b"FOO\n")
            .write(b"Unknown command: FOO\n")
            .read(b"SET onlykey\n")
            .write(b"Wrong number of arguments for SET\n")
            .read(b"PING\n")
            .write(b"PONG\n")
            .read(b"STOP\n")
            .build();

        let (result, _) = run_mock(mock).await;
        assert_eq!(result.unwrap(), CloseReason::Stop);
    }

    #[tokio::test]
    async fn test_partial_line_is_never_dispatched() {
        let mock = Builder::new().read(b"PING\nSET a b").write(b"PONG\n").build();

        let (result, stats) = run_mock(mock).await;
        assert!(matches!(result, Err(ConnectionError::UnexpectedEof)));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_read_error_closes_session() {
        let mock = Builder::new()
            .read(b"PING\n")
            .write(b"PONG\n")
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "boom"))
            .build();

        let (result, _) = run_mock(mock).await;
        assert!(matches!(result, Err(ConnectionError::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_closes_session() {
        let mock = Builder::new().read(b"GET \xff\n").build();

        let (result, stats) = run_mock(mock).await;
        assert!(matches!(
            result,
            Err(ConnectionError::Parse(ParseError::InvalidUtf8(_)))
        ));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_oversized_line_closes_session() {
        let mock = Builder::new()
            .read(&vec![b'a'; MAX_LINE_SIZE + 1])
            .build();

        let (result, stats) = run_mock(mock).await;
        assert!(matches!(
            result,
            Err(ConnectionError::Parse(ParseError::LineTooLong { .. }))
        ));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.commands_processed, 0);
        assert_eq!(snapshot.bytes_read, (MAX_LINE_SIZE + 1) as u64);
        assert_eq!(snapshot.bytes_written, 0);
    }

    #[tokio::test]
    async fn test_snapshot_counts_traffic() {
        let mock = Builder::new()
            .read(b"SET k v\nGET k\n")
            .write(b"OK\n")
            .write(b"v\n")
            .build();

        let (_, stats) = run_mock(mock).await;
        assert_eq!(
            stats.snapshot(),
            ConnectionSnapshot {
                connections_accepted: 1,
                active_connections: 0,
                commands_processed: 2,
                bytes_read: 14,
                bytes_written: 5,
            }
        );
    }

    #[tokio::test]
    async fn test_already_shut_down() {
        let stats = Arc::new(ConnectionStats::new());
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let mock = Builder::new().build();
        let handler =
            ConnectionHandler::new(mock, test_addr(), command_handler(), Arc::clone(&stats), rx);
        assert_eq!(handler.run().await.unwrap(), CloseReason::Shutdown);
        assert_eq!(stats.active(), 0);
    }

    async fn create_test_server() -> (SocketAddr, Arc<ConnectionStats>, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    handler,
                    stats,
                    shutdown_rx.clone(),
                ));
            }
        });

        (addr, stats, shutdown_tx)
    }

    #[tokio::test]
    async fn test_tcp_shutdown_closes_idle_session() {
        let (addr, stats, shutdown_tx) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"PING\n").await.unwrap();
        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"PONG\n");

        shutdown_tx.send(true).unwrap();

        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("session should close on shutdown")
            .unwrap();
        assert_eq!(n, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.active(), 0);
    }

    #[tokio::test]
    async fn test_tcp_connection_stats() {
        let (addr, stats, _shutdown_tx) = create_test_server().await;

        assert_eq!(stats.active(), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active(), 1);

        client.write_all(b"PING\n").await.unwrap();
        let mut buf = [0u8; 16];
        let _ = client.read(&mut buf).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 5);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 5);

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active(), 0);
    }
}
