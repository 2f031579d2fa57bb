//! Error types for scpilib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, wire-decode, and
//! descriptor-misuse errors are all captured here.

/// The error type for all scpilib operations.
///
/// No variant is ever recovered from inside the library: every failure is
/// surfaced to the immediate caller of the failing operation. A failed
/// decode never substitutes a default value.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (TCP socket, VISA session, serial port).
    #[error("transport error: {0}")]
    Transport(String),

    /// The operation-complete wait exceeded its timeout.
    ///
    /// The command was sent; whether the instrument finished executing it
    /// is unknown.
    #[error("operation not complete after {timeout_ms} ms: {cmd}")]
    OperationTimeout {
        /// The command that was waited on.
        cmd: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// Timed out waiting for a query response.
    #[error("timeout waiting for response")]
    Timeout,

    /// Response text did not match the declared data type or struct shape.
    #[error("decode error: {message} (raw: {raw:?})")]
    Decode {
        /// What went wrong.
        message: String,
        /// The offending raw text.
        raw: String,
    },

    /// A wire token that is not in the enum's table.
    #[error("unknown {enum_name} value: {token:?}")]
    UnknownEnumValue {
        /// Name of the enum table that was searched.
        enum_name: &'static str,
        /// The token that did not match.
        token: String,
    },

    /// A mandatory command argument was given no value.
    #[error("missing mandatory argument: {0}")]
    MissingMandatoryArgument(String),

    /// Fewer response tokens than the mandatory fields require.
    #[error("truncated response: field {field} needs {needed} token(s), {available} left")]
    TruncatedResponse {
        /// The field that could not be filled.
        field: String,
        /// Tokens the field needs.
        needed: usize,
        /// Tokens that remained in the stream.
        available: usize,
    },

    /// An invalid descriptor, template, or parameter was supplied.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The instrument reported errors in its error queue.
    #[error("instrument status error after {cmd:?}: {}", .errors.join("; "))]
    InstrumentStatus {
        /// The command after which the error queue was found non-empty.
        cmd: String,
        /// Entries read from the error queue.
        errors: Vec<String>,
    },

    /// No connection to the instrument has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the instrument was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::Decode`] carrying the offending raw text.
    pub fn decode(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Error::Decode {
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Whether this error belongs to the transport family.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::NotConnected | Error::ConnectionLost | Error::Io(_)
        )
    }

    /// Attach the full raw response to a decode error raised on a fragment.
    ///
    /// Other variants pass through unchanged.
    pub fn with_raw(self, raw: &str) -> Self {
        match self {
            Error::Decode { message, .. } => Error::Decode {
                message,
                raw: raw.to_string(),
            },
            other => other,
        }
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
