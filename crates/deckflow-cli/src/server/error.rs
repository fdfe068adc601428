//! Server lifecycle errors.

use std::io;

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The server failed while running.
    #[error("server error: {0}")]
    Runtime(#[source] io::Error),

    /// The workflow workers stopped with an error.
    #[error("workflow workers failed: {0}")]
    Workers(#[source] deckflow_server::Error),
}

impl ServerError {
    /// Returns a human-readable hint for resolving the error, if any.
    pub fn suggestion(&self) -> Option<&'static str> {
        let err = match self {
            Self::Bind { source, .. } | Self::Runtime(source) => source,
            Self::Workers(_) => return None,
        };

        match err.kind() {
            io::ErrorKind::PermissionDenied => {
                Some("Try using a port above 1024 or run with appropriate privileges")
            }
            io::ErrorKind::AddrInUse => {
                Some("The port is already in use. Try a different port or stop the conflicting service")
            }
            io::ErrorKind::AddrNotAvailable => {
                Some("The address is not available. Check network interface configuration")
            }
            _ => None,
        }
    }
}

/// Specialized [`Result`] type for server lifecycle operations.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_errors_carry_suggestions() {
        let error = ServerError::Bind {
            address: "127.0.0.1:3000".into(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(error.to_string().contains("127.0.0.1:3000"));
        assert!(error.suggestion().is_some());

        let error = ServerError::Runtime(io::Error::other("boom"));
        assert!(error.suggestion().is_none());
    }
}
