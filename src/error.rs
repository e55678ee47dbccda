// SPDX-License-Identifier: MPL-2.0

use thiserror::Error;

/// Failure of a single call across the [`Remote`](crate::atproto::Remote) seam.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The XRPC call itself failed (transport, HTTP status, or decode).
    #[error("{0}")]
    Xrpc(String),
    /// An argument could not be turned into the typed form the API expects.
    #[error("invalid {kind}: {value}")]
    InvalidInput { kind: &'static str, value: String },
}

/// Everything a listing can abort with.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("authentication failed for handle '{handle}': {message}")]
    Auth { handle: String, message: String },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("failed to resolve '{input}' to a DID: {message}")]
    Resolution { input: String, message: String },
    #[error("{operation} failed for '{input}': {message}")]
    Upstream {
        operation: &'static str,
        input: String,
        message: String,
    },
    #[error("{operation} cancelled for '{input}'")]
    Cancelled {
        operation: &'static str,
        input: String,
    },
    #[error("unsupported record kind '{kind}' at {uri}")]
    UnsupportedRecord { uri: String, kind: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Wrap a remote failure for `operation` on `input`. Malformed arguments
    /// surface as validation errors; anything else is upstream.
    pub fn upstream(operation: &'static str, input: impl Into<String>, err: RemoteError) -> Self {
        match err {
            RemoteError::InvalidInput { kind, value } => {
                Error::Validation(format!("{operation}: invalid {kind} '{value}'"))
            }
            RemoteError::Xrpc(message) => Error::Upstream {
                operation,
                input: input.into(),
                message,
            },
        }
    }

    /// Whether a retry loop should try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Upstream { .. })
    }
}
