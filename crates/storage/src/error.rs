//! Error types for backend and object-store calls.

use thiserror::Error;

/// Errors raised by the remote action client and its transports.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never completed (connection refused, timeout, TLS...).
    #[error("Request to {target} failed: {message}")]
    Transport { target: String, message: String },

    /// The response body could not be decoded.
    #[error("Could not decode response from {path}: {message}")]
    Decode { path: String, message: String },

    /// Non-success HTTP status with no recognizable backend error body.
    #[error("{path} returned HTTP {status}")]
    Http { path: String, status: u16, body: String },

    /// The backend answered with a declared failure.
    #[error("{path} failed: {error}")]
    Backend {
        path: String,
        status: u16,
        error: String,
        error_type: Option<String>,
    },

    /// No signed URL was issued for a file.
    #[error("No signed URL returned for {filename}")]
    MissingSignedUrl { filename: String },

    /// The object store rejected a transfer.
    #[error("Object store returned HTTP {status} for {filename}")]
    ObjectStore { filename: String, status: u16 },

    /// Local file system failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Session storage could not be read or written.
    #[error("Session storage error: {message}")]
    Session { message: String },

    /// Invalid client configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ClientError {
    pub fn transport(target: impl Into<String>, message: impl ToString) -> Self {
        ClientError::Transport {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ClientError::Io {
            path: path.into(),
            source,
        }
    }

    /// The backend's `errorType`, when the failure was declared by the backend.
    pub fn error_type(&self) -> Option<&str> {
        match self {
            ClientError::Backend { error_type, .. } => error_type.as_deref(),
            _ => None,
        }
    }

    /// HTTP status, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. }
            | ClientError::Backend { status, .. }
            | ClientError::ObjectStore { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_exposes_type() {
        let err: ClientError = ClientError::Backend {
            path: "/augment".into(),
            status: 500,
            error: "Split impossible".into(),
            error_type: Some("StratifiedSplitError".into()),
        };
        assert_eq!(err.error_type(), Some("StratifiedSplitError"));
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "/augment failed: Split impossible");
    }

    #[test]
    fn test_transport_error_has_no_status() {
        let err: ClientError = ClientError::transport("/gcs/create_bucket", "connection refused");
        assert_eq!(err.status(), None);
        assert_eq!(err.error_type(), None);
        assert!(err.to_string().contains("connection refused"));
    }
}
