//! Command-line configuration.
//!
//! ```text
//! linekv [OPTIONS] <PORT>
//! ```
//!
//! The port is the only required value. Parsing is done by hand; there are
//! only a handful of flags.

use thiserror::Error;

/// Host bound when `--host` is not given (all interfaces)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Config {
    /// Creates a config for `port` on the default host.
    pub fn new(port: u16) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port,
        }
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Start the server
    Serve(Config),
    /// Print help and exit
    Help,
    /// Print the version and exit
    Version,
}

/// Errors from parsing the command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Please provide port number")]
    MissingPort,

    #[error("invalid port number: {0}")]
    InvalidPort(String),

    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

impl Invocation {
    /// Parses the arguments that follow the program name.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut host = DEFAULT_HOST.to_string();
        let mut port = None;
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    host = args.next().ok_or(ConfigError::MissingValue(arg))?;
                }
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                _ if arg.starts_with('-') => return Err(ConfigError::UnexpectedArgument(arg)),
                _ if port.is_none() => {
                    let parsed = arg
                        .parse::<u16>()
                        .map_err(|_| ConfigError::InvalidPort(arg.clone()))?;
                    port = Some(parsed);
                }
                _ => return Err(ConfigError::UnexpectedArgument(arg)),
            }
        }

        let mut config = Config::new(port.ok_or(ConfigError::MissingPort)?);
        config.host = host;
        Ok(Invocation::Serve(config))
    }
}

/// Usage text printed for `--help` and on argument errors.
pub fn usage() -> String {
    format!(
        r#"LineKV {} - in-memory key-value server with a line protocol

USAGE:
    linekv [OPTIONS] <PORT>

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: {})
    -v, --version        Print version information
        --help           Print this help message

COMMANDS (one per line):
    SET key value        -> OK
    GET key              -> value, or an empty line
    ECHO [args ...]      -> echo: "args ..."
    PING                 -> PONG
    STOP                 -> closes the connection"#,
        crate::VERSION,
        DEFAULT_HOST
    )
}
