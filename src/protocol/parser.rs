//! Line Protocol Parser
//!
//! Two jobs live here:
//!
//! 1. **Framing**: [`LineParser::parse`] finds the next complete `\n`-terminated
//!    line in a read buffer. Like an incremental decoder it returns
//!    - `Ok(Some((line, consumed)))` - a full line, `consumed` bytes including the `\n`
//!    - `Ok(None)` - no newline yet, read more
//!    - `Err(ParseError)` - the stream is malformed and the session must close
//! 2. **Tokenizing**: [`parse_command`] turns one line into a [`ParsedCommand`].
//!    Tokenizing never fails; validation is the dispatcher's job.

use crate::protocol::types::LF;
use thiserror::Error;

/// Errors that can occur while framing a line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// No newline within the maximum line size
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single line, terminator included (64 KiB)
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// A command name and its arguments, as split from one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Uppercased command name; empty for a blank line
    pub name: String,
    /// Remaining tokens, original casing and order
    pub args: Vec<String>,
}

/// Splits one line into a command name and arguments.
///
/// Surrounding whitespace is trimmed and the rest is split on single spaces,
/// so `"SET  a"` yields the arguments `["", "a"]`.
///
/// # Example
///
/// ```
/// use linekv::protocol::parse_command;
///
/// let cmd = parse_command("set Name Ariz\n");
/// assert_eq!(cmd.name, "SET");
/// assert_eq!(cmd.args, vec!["Name", "Ariz"]);
/// ```
pub fn parse_command(line: &str) -> ParsedCommand {
    let mut tokens = line.trim().split(' ');
    // split always yields at least one token
    let name = tokens.next().unwrap_or_default().to_uppercase();
    let args = tokens.map(str::to_string).collect();

    ParsedCommand { name, args }
}

/// Incremental line framer.
#[derive(Debug, Clone)]
pub struct LineParser {
    max_line_size: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Creates a parser with the default line size limit.
    pub fn new() -> Self {
        Self::with_max_line_size(MAX_LINE_SIZE)
    }

    /// Creates a parser with a custom line size limit.
    pub fn with_max_line_size(max_line_size: usize) -> Self {
        Self { max_line_size }
    }

    /// Attempts to take one complete line off the front of `buf`.
    ///
    /// The returned line still carries its `\n` (and any `\r`); the command
    /// tokenizer trims it.
    pub fn parse<'a>(&self, buf: &'a [u8]) -> ParseResult<Option<(&'a str, usize)>> {
        let Some(pos) = buf.iter().position(|&b| b == LF) else {
            if buf.len() > self.max_line_size {
                return Err(ParseError::LineTooLong {
                    size: buf.len(),
                    max: self.max_line_size,
                });
            }
            return Ok(None);
        };

        let consumed = pos + 1;
        if consumed > self.max_line_size {
            return Err(ParseError::LineTooLong {
                size: consumed,
                max: self.max_line_size,
            });
        }

        let line = std::str::from_utf8(&buf[..consumed])
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

        Ok(Some((line, consumed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_basic() {
        let cmd = parse_command("SET foo bar\n");
        assert_eq!(cmd.name, "SET");
        assert_eq!(cmd.args, vec!["foo", "bar"]);
    }

    #[test]
    fn test_parse_command_uppercases_name_only() {
        let cmd = parse_command("echo Hello World");
        assert_eq!(cmd.name, "ECHO");
        assert_eq!(cmd.args, vec!["Hello", "World"]);
    }

    #[test]
    fn test_parse_command_trims_whitespace() {
        let cmd = parse_command("  \tGET key \r\n");
        assert_eq!(cmd.name, "GET");
        assert_eq!(cmd.args, vec!["key"]);
    }

    #[test]
    fn test_parse_command_keeps_empty_tokens() {
        let cmd = parse_command("SET  a b");
        assert_eq!(cmd.name, "SET");
        assert_eq!(cmd.args, vec!["", "a", "b"]);
    }

    #[test]
    fn test_parse_command_blank_line() {
        let cmd = parse_command("   \n");
        assert_eq!(cmd.name, "");
        assert!(cmd.args.is_empty());

        let cmd = parse_command("");
        assert_eq!(cmd.name, "");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_parse_command_no_args() {
        let cmd = parse_command("ping\n");
        assert_eq!(cmd.name, "PING");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_line_parser_complete() {
        let parser = LineParser::new();
        let result = parser.parse(b"PING\n").unwrap();
        assert_eq!(result, Some(("PING\n", 5)));
    }

    #[test]
    fn test_line_parser_incomplete() {
        let parser = LineParser::new();
        assert_eq!(parser.parse(b"PIN").unwrap(), None);
        assert_eq!(parser.parse(b"").unwrap(), None);
    }

    #[test]
    fn test_line_parser_takes_first_line_only() {
        let parser = LineParser::new();
        let buf = b"SET a 1\nGET a\n";

        let (line, consumed) = parser.parse(buf).unwrap().unwrap();
        assert_eq!(line, "SET a 1\n");
        assert_eq!(consumed, 8);

        let (line, consumed) = parser.parse(&buf[consumed..]).unwrap().unwrap();
        assert_eq!(line, "GET a\n");
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_line_parser_too_long() {
        let parser = LineParser::with_max_line_size(8);

        assert!(matches!(
            parser.parse(b"0123456789"),
            Err(ParseError::LineTooLong { size: 10, max: 8 })
        ));
        assert!(matches!(
            parser.parse(b"012345678\n"),
            Err(ParseError::LineTooLong { size: 10, max: 8 })
        ));
        assert!(parser.parse(b"0123456\n").unwrap().is_some());
    }

    #[test]
    fn test_line_parser_invalid_utf8() {
        let parser = LineParser::new();
        assert!(matches!(
            parser.parse(b"GET \xff\xfe\n"),
            Err(ParseError::InvalidUtf8(_))
        ));
    }
}
