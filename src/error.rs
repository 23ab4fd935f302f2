//! Error types for the IRC client session engine.
//!
//! Errors split into two families: recoverable per-line problems (a line
//! that fails to decode or parse is dropped and the session continues) and
//! fatal session errors (server-issued `ERROR`, end of stream, framer
//! overflow) after which no further dispatch is valid.

use thiserror::Error;

/// Convenience type alias for Results using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level session errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// One line could not be decoded with the configured text encoding.
    /// Recoverable: the line is dropped, the session continues, and the
    /// framer's retained fragment is untouched.
    #[error("decode error: line is not valid {encoding}")]
    Decode {
        /// Name of the encoding the framer is configured with.
        encoding: &'static str,
    },

    /// The framer's retained fragment grew past its bound without a line
    /// terminator. Fatal: a peer that never terminates a line is broken or
    /// malicious.
    #[error("buffered fragment too long: {actual} bytes (limit {limit})")]
    FragmentTooLong {
        /// Current fragment size in bytes.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The server issued an `ERROR` command and closed the link.
    /// Fatal: carries the server's reason text; the session is torn down.
    #[error("server closed the link: {0}")]
    Server(String),

    /// The transport reached end of stream. Fatal.
    #[error("end of stream")]
    Eof,

    /// Dispatch was attempted on a session that has already been torn down.
    #[error("session closed")]
    SessionClosed,

    /// A line could not be parsed into prefix/verb/args. Recoverable at the
    /// driver: drop the line, keep the session.
    #[error("invalid line: {string}")]
    InvalidLine {
        /// The raw line text.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: LineParseError,
    },
}

impl Error {
    /// Whether this error ends the session.
    ///
    /// Non-fatal errors describe a single dropped line; the caller should
    /// keep feeding and dispatching.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Decode { .. } | Self::InvalidLine { .. })
    }
}

/// Errors encountered when parsing a single protocol line.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LineParseError {
    /// Line was empty.
    #[error("empty line")]
    EmptyLine,

    /// The verb was missing or not an alphanumeric word.
    #[error("invalid verb")]
    InvalidVerb,
}
