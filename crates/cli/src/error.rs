//! Error type for CLI commands.

use morph_split_model::ConfigError;
use morph_split_orchestrator::{self as orchestrator, OrchestrationError};
use morph_split_storage::ClientError;
use serde::Serialize;

/// Error returned by a command.
#[derive(Debug, Serialize)]
pub struct CommandError {
    pub message: String,
    pub kind: ErrorKind,
    /// Already shown to the user as a notification.
    #[serde(skip)]
    pub reported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    Validation,
    StepFailed,
    StratifiedSplit,
    Busy,
    Client,
    IoError,
}

impl CommandError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            kind: ErrorKind::InvalidArgument,
            reported: false,
        }
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            kind: ErrorKind::IoError,
            reported: false,
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_argument(err.to_string())
    }
}

impl From<ConfigError> for CommandError {
    fn from(err: ConfigError) -> Self {
        Self::invalid_argument(err.to_string())
    }
}

impl From<ClientError> for CommandError {
    fn from(err: ClientError) -> Self {
        let kind: ErrorKind = match err {
            ClientError::Io { .. } => ErrorKind::IoError,
            _ => ErrorKind::Client,
        };
        Self {
            message: err.to_string(),
            kind,
            reported: false,
        }
    }
}

/// Flow errors have been notified by the orchestrator already.
impl From<OrchestrationError> for CommandError {
    fn from(err: OrchestrationError) -> Self {
        let kind: ErrorKind = match err.kind {
            orchestrator::ErrorKind::Validation => ErrorKind::Validation,
            orchestrator::ErrorKind::StepFailed => ErrorKind::StepFailed,
            orchestrator::ErrorKind::StratifiedSplit => ErrorKind::StratifiedSplit,
            orchestrator::ErrorKind::Busy => ErrorKind::Busy,
            orchestrator::ErrorKind::Client => ErrorKind::Client,
        };
        Self {
            message: err.to_string(),
            kind,
            reported: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_split_model::ValidationError;

    #[test]
    fn test_serializes_kind_in_snake_case() {
        let err: CommandError = OrchestrationError::busy("Download").into();
        let json: serde_json::Value = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "busy");
        assert!(json.get("reported").is_none());
    }

    #[test]
    fn test_flow_errors_are_marked_reported() {
        let err: CommandError = OrchestrationError::from(ValidationError::NoFileSelected).into();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.reported);

        let err: CommandError = ConfigError::UnknownField("zoom".into()).into();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(!err.reported);
    }
}
