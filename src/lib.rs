//! # LineKV - A Tiny In-Memory Key-Value Server
//!
//! LineKV keeps string keys and values in memory and serves them over TCP
//! with a plain, newline-delimited text protocol. Nothing is persisted; the
//! data lives as long as the process.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                             LineKV                              │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │          │
//! │  │ (Acceptor)  │    │  Handler    │    │  Handler    │          │
//! │  └──────┬──────┘    └──────┬──────┘    └──────┬──────┘          │
//! │         │                  │                  │                 │
//! │         │           ┌──────┴──────┐           ▼                 │
//! │         │           │ Line Parser │    ┌─────────────────────┐  │
//! │         │           └─────────────┘    │   StorageEngine     │  │
//! │         │                              │ (sharded RwLocks)   │  │
//! │  ┌──────┴──────┐                       └─────────────────────┘  │
//! │  │  Signals    │ shutdown ──► all sessions close                │
//! │  └─────────────┘                                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use linekv::server::{self, Signals};
//! use linekv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let mut signals = Signals::install()?;
//!     let listener = server::bind("127.0.0.1:6380").await?;
//!
//!     server::run(listener, storage, async move {
//!         signals.recv().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol
//!
//! | Request          | Response                                  |
//! |------------------|-------------------------------------------|
//! | `PING`           | `PONG`                                    |
//! | `ECHO a b`       | `echo: "a b"`                             |
//! | `SET key value`  | `OK`                                      |
//! | `GET key`        | the value, or an empty line               |
//! | `STOP`           | nothing; the connection closes            |
//! | anything else    | `Unknown command: <NAME>`                 |
//!
//! `SET` and `GET` with the wrong number of arguments answer
//! `Wrong number of arguments for <NAME>` and keep the connection open.
//!
//! ## Module Overview
//!
//! - [`protocol`]: line framing, command tokenizing, response types
//! - [`storage`]: thread-safe in-memory store
//! - [`commands`]: command dispatch
//! - [`connection`]: per-client session loop
//! - [`server`]: listener, accept loop and shutdown
//! - [`config`]: command-line parsing

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::CommandHandler;
pub use config::{Config, Invocation};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{parse_command, LineParser, ParseError, ParsedCommand, Response};
pub use server::ServerError;
pub use storage::StorageEngine;

/// Version of LineKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
