//! Request, response, and settings types shared by the client and transports.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use morph_split_model::content_type_for;
use serde_json::Value;

use crate::error::ClientError;

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Default request timeout. Augmentation runs synchronously on the backend,
/// so this is generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection settings for the backend.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL every endpoint path is joined onto.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("morph-split/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Base URL without trailing slashes.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, file: &UploadFile) -> Self {
        FormPart::File {
            name: name.into(),
            filename: file.name.clone(),
            content_type: file.content_type.clone(),
            bytes: file.bytes.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

/// A backend request, before the base URL is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Endpoint path, starting with `/`.
    pub path: String,
    /// Query parameters; a key may repeat.
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// First value of query parameter `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Response carrying `value` as its JSON body.
    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A file selected for upload, loaded in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Build from in-memory bytes; the content type follows the extension.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name: String = name.into();
        let content_type: String = content_type_for(&name).to_string();
        Self {
            name,
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk.
    ///
    /// # Errors
    /// Returns `ClientError::Io` if the file cannot be read or has no file name.
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let name: String = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ClientError::io(
                    path.display().to_string(),
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
                )
            })?;
        let bytes: Vec<u8> = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::io(path.display().to_string(), e))?;
        Ok(Self::new(name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Outcome of a batch upload to the object store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// True only if every file was stored.
    pub success: bool,
    /// Names of the files that were not stored.
    pub failed_files: Vec<String>,
}

impl UploadReport {
    pub fn from_failures(failed_files: Vec<String>) -> Self {
        Self {
            success: failed_files.is_empty(),
            failed_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_builder() {
        let settings: ClientSettings = ClientSettings::default()
            .with_base_url("http://backend:8080/")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(settings.normalized_base_url(), "http://backend:8080");
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert!(settings.user_agent.starts_with("morph-split/"));
    }

    #[test]
    fn test_request_query() {
        let request: ApiRequest = ApiRequest::new(HttpMethod::Get, "/generate-signed-download-url")
            .with_query("filenames", "a.zip")
            .with_query("filenames", "b.zip");

        assert_eq!(request.query.len(), 2);
        assert_eq!(request.query_value("filenames"), Some("a.zip"));
        assert_eq!(request.query_value("sessionId"), None);
    }

    #[test]
    fn test_upload_file_content_type() {
        let file: UploadFile = UploadFile::new("cell_01.JPEG", vec![1, 2, 3]);
        assert_eq!(file.content_type, "image/jpeg");
        assert_eq!(file.size(), 3);
    }

    #[tokio::test]
    async fn test_upload_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask_3.png");
        std::fs::write(&path, b"png-bytes").unwrap();

        let file: UploadFile = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "mask_3.png");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.bytes, b"png-bytes");

        let missing = UploadFile::from_path(&dir.path().join("absent.png")).await;
        assert!(matches!(missing, Err(ClientError::Io { .. })));
    }

    #[test]
    fn test_upload_report() {
        assert!(UploadReport::from_failures(Vec::new()).success);
        let report: UploadReport = UploadReport::from_failures(vec!["b.png".into()]);
        assert!(!report.success);
        assert_eq!(report.failed_files, vec!["b.png".to_string()]);
    }
}
