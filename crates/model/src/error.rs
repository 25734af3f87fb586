//! Error types for configuration updates and file validation.

use thiserror::Error;

use crate::ratios::Split;

/// Errors raised while updating the augmentation configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("The {split} ratio is locked")]
    RatioLocked { split: Split },

    #[error("Ratio must be between 0 and 1, got {value}")]
    RatioOutOfRange { value: f64 },

    #[error("Unknown split: {0}")]
    UnknownSplit(String),

    #[error("Unknown configuration field: {0}")]
    UnknownField(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Client-local validation errors, detected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select at least one file to upload.")]
    NoFileSelected,

    #[error("File \"{filename}\" is not a valid format (only {allowed} allowed).")]
    InvalidFileFormat {
        /// The offending file name.
        filename: String,
        /// Human-readable list of accepted extensions.
        allowed: String,
    },
}

impl ValidationError {
    /// Short title used for user notifications.
    pub fn title(&self) -> &'static str {
        match self {
            ValidationError::NoFileSelected => "No File Selected",
            ValidationError::InvalidFileFormat { .. } => "Invalid File Format",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_locked_message() {
        let err: ConfigError = ConfigError::RatioLocked { split: Split::Val };
        assert_eq!(err.to_string(), "The val ratio is locked");
    }

    #[test]
    fn test_invalid_format_message() {
        let err: ValidationError = ValidationError::InvalidFileFormat {
            filename: "notes.txt".into(),
            allowed: "jpg, jpeg, png".into(),
        };
        let msg: String = err.to_string();
        assert!(msg.contains("notes.txt"));
        assert!(msg.contains("jpg, jpeg, png"));
        assert_eq!(err.title(), "Invalid File Format");
    }
}
