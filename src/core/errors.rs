//! Error types for the replication engine
//!
//! Provides structured error handling using thiserror so callers can
//! distinguish connection failures from protocol violations and from
//! errors the server reported itself.

use thiserror::Error;

/// SQLSTATE reported for unknown keywords in replication commands.
/// Older servers answer version-gated options this way.
pub const SQLSTATE_SYNTAX_ERROR: &str = "42601";

/// SQLSTATE for a cancelled query. Received inside `CopyBoth` it means the
/// server ended the stream deliberately, not that something broke.
pub const SQLSTATE_QUERY_CANCELED: &str = "57014";

/// Main error type for the replication engine
#[derive(Error, Debug)]
pub enum WalError {
    /// Socket or stream failure; fatal to the session
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Unexpected tag, length mismatch or unknown sub-code; fatal to the session
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// An `ErrorResponse` from the server, with its SQLSTATE
    #[error("server error {code}: {message}")]
    Server {
        severity: String,
        code: String,
        message: String,
    },

    /// A replication-command option the connected server version does not accept
    #[error("option {option} is not supported by server version {server_version}")]
    UnsupportedByServerVersion {
        option: &'static str,
        server_version: String,
    },

    /// Caller-side misuse (empty slot name, missing publication, ...)
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The consumer cancelled the operation
    #[error("cancelled")]
    Cancelled,

    /// A non-buffered column or payload was read a second time
    #[error("value already consumed")]
    AlreadyConsumed,
}

/// Result type alias for convenience
pub type WalResult<T> = std::result::Result<T, WalError>;

impl WalError {
    /// Create a protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a caller-side argument error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// The SQLSTATE carried by a server error, if this is one
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the session must be torn down after this error.
    ///
    /// Server errors are recoverable once the stream has drained back to
    /// `ReadyForQuery`; everything wire-level is not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Protocol { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_exposes_sqlstate() {
        let err = WalError::Server {
            severity: "ERROR".to_string(),
            code: SQLSTATE_SYNTAX_ERROR.to_string(),
            message: "syntax error".to_string(),
        };
        assert_eq!(err.sqlstate(), Some("42601"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn io_and_protocol_errors_are_fatal() {
        let io = WalError::from(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "closed",
        ));
        assert!(io.is_fatal());
        assert!(WalError::protocol("bad tag").is_fatal());
        assert!(!WalError::Cancelled.is_fatal());
    }
}
