//! Structured errors surfaced by the orchestration flows.

use std::fmt;

use morph_split_model::{ConfigError, ValidationError};
use morph_split_storage::ClientError;
use thiserror::Error;

/// Category of an [`OrchestrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Local input was rejected before any request.
    Validation,
    /// A remote step failed; later steps were not run.
    StepFailed,
    /// The backend could not produce the requested stratified split.
    StratifiedSplit,
    /// Another invocation of the same operation is in flight.
    Busy,
    /// Failure outside any step (session storage, configuration...).
    Client,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &str = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::StepFailed => "step_failed",
            ErrorKind::StratifiedSplit => "stratified_split",
            ErrorKind::Busy => "busy",
            ErrorKind::Client => "client",
        };
        f.write_str(s)
    }
}

/// A user-facing error: a short title and a description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{title}: {message}")]
pub struct OrchestrationError {
    pub kind: ErrorKind,
    pub title: String,
    pub message: String,
}

impl OrchestrationError {
    pub fn new(kind: ErrorKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn step_failed(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StepFailed, title, message)
    }

    pub fn busy(operation: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Busy,
            "Operation In Progress",
            format!("{} is already running. Wait for it to finish.", operation),
        )
    }

    pub fn is_busy(&self) -> bool {
        self.kind == ErrorKind::Busy
    }
}

impl From<ValidationError> for OrchestrationError {
    fn from(err: ValidationError) -> Self {
        Self::new(ErrorKind::Validation, err.title(), err.to_string())
    }
}

impl From<ConfigError> for OrchestrationError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Validation, "Invalid Configuration", err.to_string())
    }
}

impl From<ClientError> for OrchestrationError {
    fn from(err: ClientError) -> Self {
        Self::new(ErrorKind::Client, "Request Failed", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_title_and_message() {
        let err: OrchestrationError =
            OrchestrationError::step_failed("Resize Failed", "Failed to resize uploaded images.");
        assert_eq!(err.to_string(), "Resize Failed: Failed to resize uploaded images.");
        assert_eq!(err.kind, ErrorKind::StepFailed);
    }

    #[test]
    fn test_validation_conversion_keeps_title() {
        let err: OrchestrationError = ValidationError::NoFileSelected.into();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.title, "No File Selected");
    }

    #[test]
    fn test_busy() {
        let err: OrchestrationError = OrchestrationError::busy("Image upload");
        assert!(err.is_busy());
        assert!(err.message.contains("Image upload"));
    }
}
