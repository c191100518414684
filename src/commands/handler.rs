//! Command Handler
//!
//! Maps a parsed command onto the storage engine and produces a [`Response`].
//!
//! ## Supported Commands
//!
//! - `STOP` - Close this connection (no reply, arguments ignored)
//! - `PING` - Reply `PONG` (arguments ignored)
//! - `ECHO [arg ...]` - Reply `echo: "<args joined by spaces>"`
//! - `SET key value` - Store a value, reply `OK`
//! - `GET key` - Reply with the value, or an empty line if absent
//!
//! Only `SET` and `GET` check their argument count.

use crate::protocol::{parse_command, ParsedCommand, Response};
use crate::storage::StorageEngine;
use std::sync::Arc;
use tracing::trace;

/// Dispatches commands against the shared storage engine.
///
/// Cloning is cheap; every connection gets its own clone.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Parses one raw line and dispatches it.
    pub fn execute(&self, line: &str) -> Response {
        let ParsedCommand { name, args } = parse_command(line);
        self.dispatch(&name, &args)
    }

    /// Dispatches a command to its handler.
    ///
    /// `cmd` must already be uppercased.
    pub fn dispatch(&self, cmd: &str, args: &[String]) -> Response {
        trace!(command = cmd, argc = args.len(), "Dispatching command");

        match cmd {
            "STOP" => Response::NoReply,
            "PING" => Response::Pong,
            "ECHO" => self.cmd_echo(args),
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            _ => Response::unknown(cmd),
        }
    }

    /// ECHO [arg ...]
    fn cmd_echo(&self, args: &[String]) -> Response {
        Response::Echo(args.join(" "))
    }

    /// SET key value
    fn cmd_set(&self, args: &[String]) -> Response {
        let [key, value] = args else {
            return Response::wrong_arity("SET");
        };

        self.storage.set(key.as_str(), value.as_str());
        Response::Ok
    }

    /// GET key
    fn cmd_get(&self, args: &[String]) -> Response {
        let [key] = args else {
            return Response::wrong_arity("GET");
        };

        Response::value(self.storage.get(key))
    }
}
