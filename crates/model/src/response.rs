//! Records exchanged with the augmentation backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ImageDimension;

/// Classification attached to a declared backend failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    /// The stratified split could not satisfy the requested ratios.
    StratifiedSplit,
    Other(String),
}

impl ErrorType {
    pub const STRATIFIED_SPLIT: &'static str = "StratifiedSplitError";

    pub fn from_wire(value: &str) -> Self {
        match value {
            Self::STRATIFIED_SPLIT => ErrorType::StratifiedSplit,
            other => ErrorType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorType::StratifiedSplit => Self::STRATIFIED_SPLIT,
            ErrorType::Other(s) => s,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The standard `{success, message?, error?}` result of backend triggers
/// and status checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<ImageDimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<String>>,
}

impl BackendResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Fold a fallible call into the absorbing `{success: false, error}` form.
    pub fn absorb<E: fmt::Display>(result: Result<BackendResponse, E>) -> BackendResponse {
        match result {
            Ok(response) => response,
            Err(e) => BackendResponse::failure(e.to_string()),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorType> {
        self.error_type.as_deref().map(ErrorType::from_wire)
    }

    /// Best human-readable explanation: the declared error, then the message.
    pub fn describe(&self) -> String {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("An unknown error occurred.")
            .to_string()
    }
}

/// A paginated or plain collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl<T> Default for FetchResponse<T> {
    fn default() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: Vec::new(),
            success: None,
        }
    }
}

impl<T> FetchResponse<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// A pre-authorized object-store URL for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Batch of signed URLs returned by the URL generation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrls {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub results: Vec<SignedUrl>,
}

impl SignedUrls {
    pub fn find(&self, filename: &str) -> Option<&SignedUrl> {
        self.results.iter().find(|u| u.filename == filename)
    }
}

/// A file name with a URL to view it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUrl {
    pub name: String,
    pub url: String,
}

/// An uploaded image and its mask, as listed by the metadata endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMaskPair {
    pub image: NamedUrl,
    pub mask: NamedUrl,
}
