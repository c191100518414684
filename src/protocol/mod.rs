//! Line Protocol Implementation
//!
//! LineKV speaks a plain text protocol: one command per `\n`-terminated
//! line, one response line back.
//!
//! ## Modules
//!
//! - `types`: the `Response` enum and its wire serialization
//! - `parser`: line framing and command tokenizing
//!
//! ## Example
//!
//! ```
//! use linekv::protocol::{parse_command, LineParser, Response};
//!
//! let parser = LineParser::new();
//! let (line, consumed) = parser.parse(b"GET name\n").unwrap().unwrap();
//! assert_eq!(consumed, 9);
//!
//! let cmd = parse_command(line);
//! assert_eq!(cmd.name, "GET");
//!
//! assert_eq!(Response::Pong.serialize(), b"PONG\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_command, LineParser, ParseError, ParseResult, ParsedCommand};
pub use types::{CommandError, Response};
