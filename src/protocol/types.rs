//! Response Types
//!
//! The dispatcher never formats wire text itself. It returns a [`Response`],
//! and the session turns that into bytes with [`Response::serialize`].
//!
//! ## Wire Format
//!
//! Every response is a single line terminated by `\n`:
//!
//! ```text
//! PONG
//! echo: "hello world"
//! OK
//! bar                                  (GET hit)
//!                                      (GET miss: empty line)
//! Wrong number of arguments for SET
//! Unknown command: FOO
//! ```
//!
//! `STOP` produces [`Response::NoReply`], which serializes to nothing.

use std::fmt;
use thiserror::Error;

/// The line terminator used on the wire.
pub const LF: u8 = b'\n';

/// Errors reported back to the client as a response line.
///
/// The `Display` output is exactly the text sent on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command got the wrong number of arguments
    #[error("Wrong number of arguments for {0}")]
    WrongArity(String),

    /// The command name is not recognized
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Outcome of dispatching one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A write succeeded
    Ok,

    /// Reply to PING
    Pong,

    /// Reply to ECHO, holding the already-joined arguments
    Echo(String),

    /// Reply to GET; `None` when the key is absent
    Value(Option<String>),

    /// A recoverable protocol error
    Error(CommandError),

    /// Nothing is written and the session closes
    NoReply,
}

impl Response {
    /// Creates a value response.
    pub fn value(v: Option<String>) -> Self {
        Response::Value(v)
    }

    /// Creates an arity error for `command`.
    pub fn wrong_arity(command: impl Into<String>) -> Self {
        Response::Error(CommandError::WrongArity(command.into()))
    }

    /// Creates an unknown-command error for `command`.
    pub fn unknown(command: impl Into<String>) -> Self {
        Response::Error(CommandError::UnknownCommand(command.into()))
    }

    /// Returns true if the session should close after this response.
    pub fn closes_session(&self) -> bool {
        matches!(self, Response::NoReply)
    }

    /// Returns true if this response is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Serializes the response to its wire representation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::NoReply => return,
            Response::Ok => buf.extend_from_slice(b"OK"),
            Response::Pong => buf.extend_from_slice(b"PONG"),
            Response::Echo(text) => {
                buf.extend_from_slice(b"echo: \"");
                buf.extend_from_slice(text.as_bytes());
                buf.push(b'"');
            }
            Response::Value(Some(v)) => buf.extend_from_slice(v.as_bytes()),
            Response::Value(None) => {}
            Response::Error(e) => buf.extend_from_slice(e.to_string().as_bytes()),
        }
        buf.push(LF);
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "OK"),
            Response::Pong => write!(f, "PONG"),
            Response::Echo(text) => write!(f, "echo: \"{}\"", text),
            Response::Value(Some(v)) => write!(f, "{}", v),
            Response::Value(None) => Ok(()),
            Response::Error(e) => write!(f, "{}", e),
            Response::NoReply => write!(f, "(no reply)"),
        }
    }
}
