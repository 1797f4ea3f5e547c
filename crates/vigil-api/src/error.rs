use thiserror::Error;

/// Failure classification for every remote operation in this crate.
///
/// The panel protocol deliberately keeps a coarse taxonomy: callers branch
/// on exactly two failure classes (plus `Ok`). Transport-level faults --
/// timeouts, DNS, TLS, malformed bodies -- are caught at the lowest layer
/// and folded into [`Server`](Error::Server); nothing finer is surfaced.
#[derive(Debug, Error)]
pub enum Error {
    /// No network connectivity was detected, so no request was attempted.
    #[error("no network connectivity")]
    Network,

    /// The server rejected the request (non-success status), returned a
    /// malformed response, or the transport itself failed.
    #[error("server error: {message}")]
    Server { message: String },
}

impl Error {
    pub(crate) fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Returns `true` if this failure was a pre-flight connectivity check.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Returns `true` if this failure came from the server or transport.
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. })
    }
}
