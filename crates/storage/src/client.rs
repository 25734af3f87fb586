//! Remote action client.
//!
//! [`Backend`] owns the transport and the session identity. Each call site
//! asks it for an [`ActionClient`] bound to one endpoint path and then uses
//! the primitive that matches the call:
//!
//! - **Triggers** (`execute_action`, `get_status`, `delete_file_or_directory`)
//!   decode a [`BackendResponse`] whatever the HTTP status, so declared
//!   failures come back as `success: false` for the caller to inspect.
//! - **Data calls** (`post_data`, `get_all`, signed URL requests) turn a
//!   non-success status into [`ClientError::Backend`].
//!
//! Every backend request carries the `sessionId` query parameter.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use morph_split_model::{BackendResponse, FetchResponse, SignedUrl, SignedUrls};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::session::SessionIdentity;
use crate::traits::Transport;
use crate::types::{ApiRequest, ApiResponse, HttpMethod, RequestBody, UploadFile, UploadReport};

/// Query parameter carrying the session id.
pub const SESSION_QUERY_PARAM: &str = "sessionId";

/// Entry point for every backend call.
pub struct Backend<T: Transport> {
    transport: Arc<T>,
    identity: SessionIdentity,
}

impl<T: Transport> Clone for Backend<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            identity: self.identity.clone(),
        }
    }
}

impl<T: Transport> Backend<T> {
    pub fn new(transport: Arc<T>, identity: SessionIdentity) -> Self {
        Self {
            transport,
            identity,
        }
    }

    /// A client bound to `path`.
    pub fn endpoint(&self, path: impl Into<String>) -> ActionClient<T> {
        ActionClient {
            transport: Arc::clone(&self.transport),
            identity: self.identity.clone(),
            path: path.into(),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }
}

/// A client bound to one endpoint path.
pub struct ActionClient<T: Transport> {
    transport: Arc<T>,
    identity: SessionIdentity,
    path: String,
}

impl<T: Transport> ActionClient<T> {
    pub fn path(&self) -> &str {
        &self.path
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// POST with an optional body; returns the backend's declared result.
    ///
    /// # Errors
    /// Transport failures, and responses that are not a backend result.
    pub async fn execute_action(&self, body: RequestBody) -> Result<BackendResponse, ClientError> {
        let response: ApiResponse = self.send(HttpMethod::Post, &self.path, Vec::new(), body).await?;
        decode_result(&self.path, response)
    }

    /// GET a status check.
    pub async fn get_status(
        &self,
        params: &[(&str, String)],
    ) -> Result<BackendResponse, ClientError> {
        let response: ApiResponse = self
            .send(HttpMethod::Get, &self.path, owned(params), RequestBody::Empty)
            .await?;
        decode_result(&self.path, response)
    }

    /// DELETE the endpoint, or `endpoint/suffix` when a suffix is given.
    pub async fn delete_file_or_directory(
        &self,
        suffix: Option<&str>,
    ) -> Result<BackendResponse, ClientError> {
        let path: String = match suffix {
            Some(s) => format!("{}/{}", self.path.trim_end_matches('/'), s.trim_start_matches('/')),
            None => self.path.clone(),
        };
        let response: ApiResponse = self
            .send(HttpMethod::Delete, &path, Vec::new(), RequestBody::Empty)
            .await?;
        decode_result(&path, response)
    }

    // ========================================================================
    // Data calls
    // ========================================================================

    /// POST and decode the typed payload.
    ///
    /// # Errors
    /// `ClientError::Backend` for a non-success status, `Decode` if the
    /// payload does not match `R`.
    pub async fn post_data<R: DeserializeOwned>(&self, body: RequestBody) -> Result<R, ClientError> {
        let response: ApiResponse = self.send(HttpMethod::Post, &self.path, Vec::new(), body).await?;
        decode_data(&self.path, response)
    }

    /// GET a collection.
    pub async fn get_all<R: DeserializeOwned>(
        &self,
        params: &[(&str, String)],
    ) -> Result<FetchResponse<R>, ClientError> {
        let response: ApiResponse = self
            .send(HttpMethod::Get, &self.path, owned(params), RequestBody::Empty)
            .await?;
        decode_data(&self.path, response)
    }

    /// Ask the backend for one signed upload URL per file.
    ///
    /// # Arguments
    /// * `filenames` - Names the objects will have in the folder
    /// * `content_types` - MIME type of each file, in the same order
    /// * `folder` - Destination folder in the bucket
    pub async fn get_signed_upload_urls(
        &self,
        filenames: &[String],
        content_types: &[String],
        folder: &str,
    ) -> Result<SignedUrls, ClientError> {
        let body: RequestBody = RequestBody::Json(json!({
            "filenames": filenames,
            "content_types": content_types,
            "folder_path": folder,
        }));
        self.post_data(body).await
    }

    /// Ask the backend for signed read URLs.
    pub async fn get_signed_download_urls(
        &self,
        filenames: &[String],
    ) -> Result<Vec<SignedUrl>, ClientError> {
        let query: Vec<(String, String)> = filenames
            .iter()
            .map(|f| ("filenames".to_string(), f.clone()))
            .collect();
        let response: ApiResponse = self
            .send(HttpMethod::Get, &self.path, query, RequestBody::Empty)
            .await?;
        let urls: SignedUrls = decode_data(&self.path, response)?;
        if urls.success == Some(false) {
            return Err(ClientError::Backend {
                path: self.path.clone(),
                status: 200,
                error: "Backend refused to sign download URLs".into(),
                error_type: None,
            });
        }
        Ok(urls.results)
    }

    // ========================================================================
    // Object store
    // ========================================================================

    /// Upload a batch of files to `folder` through signed URLs.
    ///
    /// URLs are requested for the whole batch at once; then every file with a
    /// URL is PUT in parallel. A file fails on its own (missing URL, transport
    /// error, non-success status) without stopping the others.
    ///
    /// # Errors
    /// Only the signed URL request itself; per-file failures are reported in
    /// the returned [`UploadReport`].
    pub async fn upload_to_object_store(
        &self,
        files: &[UploadFile],
        folder: &str,
    ) -> Result<UploadReport, ClientError> {
        let filenames: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let content_types: Vec<String> = files.iter().map(|f| f.content_type.clone()).collect();
        let urls: SignedUrls = self
            .get_signed_upload_urls(&filenames, &content_types, folder)
            .await?;

        let uploads = files.iter().map(|file| {
            let signed: Option<SignedUrl> = urls.find(&file.name).cloned();
            let transport: Arc<T> = Arc::clone(&self.transport);
            async move {
                let result: Result<(), ClientError> = match signed {
                    None => Err(ClientError::MissingSignedUrl {
                        filename: file.name.clone(),
                    }),
                    Some(url) => {
                        let content_type: String =
                            url.content_type.unwrap_or_else(|| file.content_type.clone());
                        match transport
                            .put_object(&url.url, &content_type, file.bytes.clone())
                            .await
                        {
                            Ok(status) if (200..300).contains(&status) => Ok(()),
                            Ok(status) => Err(ClientError::ObjectStore {
                                filename: file.name.clone(),
                                status,
                            }),
                            Err(e) => Err(e),
                        }
                    }
                };
                (file.name.clone(), result)
            }
        });

        let mut failed: Vec<String> = Vec::new();
        for (name, result) in join_all(uploads).await {
            if let Err(e) = result {
                warn!(file = %name, folder = %folder, error = %e, "Object upload failed");
                failed.push(name);
            }
        }

        debug!(
            folder = %folder,
            total = files.len(),
            failed = failed.len(),
            "Object store batch finished"
        );
        Ok(UploadReport::from_failures(failed))
    }

    /// Fetch an object's bytes from a signed URL.
    pub async fn download_object(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        self.transport.get_object(url).await
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        mut query: Vec<(String, String)>,
        body: RequestBody,
    ) -> Result<ApiResponse, ClientError> {
        query.push((SESSION_QUERY_PARAM.to_string(), self.identity.session_id()?));
        debug!(method = %method, path = %path, "Backend call");
        let request: ApiRequest = ApiRequest {
            method,
            path: path.to_string(),
            query,
            body,
        };
        self.transport.send(request).await
    }
}

/// Save downloaded bytes as `dir/filename`.
///
/// Only the final component of `filename` is used, so a name coming back
/// from the backend cannot escape `dir`.
///
/// # Errors
/// Returns `ClientError::Io` if the directory or file cannot be written.
pub async fn download_blob(data: &[u8], dir: &Path, filename: &str) -> Result<PathBuf, ClientError> {
    let name: &str = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("download");
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ClientError::io(dir.display().to_string(), e))?;
    let target: PathBuf = dir.join(name);
    tokio::fs::write(&target, data)
        .await
        .map_err(|e| ClientError::io(target.display().to_string(), e))?;
    debug!(path = %target.display(), bytes = data.len(), "Saved download");
    Ok(target)
}

fn owned(params: &[(&str, String)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn decode_result(path: &str, response: ApiResponse) -> Result<BackendResponse, ClientError> {
    match serde_json::from_slice::<BackendResponse>(&response.body) {
        Ok(result) => Ok(result),
        Err(_) if !response.is_success() => Err(ClientError::Http {
            path: path.to_string(),
            status: response.status,
            body: response.body_text(),
        }),
        Err(e) => Err(ClientError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        }),
    }
}

fn decode_data<R: DeserializeOwned>(path: &str, response: ApiResponse) -> Result<R, ClientError> {
    if !response.is_success() {
        return Err(match serde_json::from_slice::<BackendResponse>(&response.body) {
            Ok(declared) => ClientError::Backend {
                path: path.to_string(),
                status: response.status,
                error: declared.describe(),
                error_type: declared.error_type,
            },
            Err(_) => ClientError::Http {
                path: path.to_string(),
                status: response.status,
                body: response.body_text(),
            },
        });
    }
    serde_json::from_slice(&response.body).map_err(|e| ClientError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_result_keeps_declared_failure() {
        let response: ApiResponse =
            ApiResponse::new(500, r#"{"success": false, "error": "bucket exists"}"#);
        let result: BackendResponse = decode_result("/gcs/create_bucket", response).unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("bucket exists"));
    }

    #[test]
    fn test_decode_result_unparseable() {
        let err: ClientError = decode_result("/x", ApiResponse::new(502, "Bad Gateway")).unwrap_err();
        assert!(matches!(err, ClientError::Http { status: 502, .. }));

        let err: ClientError = decode_result("/x", ApiResponse::new(200, "<html>")).unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[test]
    fn test_decode_data_maps_status_to_backend_error() {
        let response: ApiResponse = ApiResponse::new(
            500,
            r#"{"success": false, "error": "bad split", "errorType": "StratifiedSplitError"}"#,
        );
        let err: ClientError = decode_data::<BackendResponse>("/augment", response).unwrap_err();

        assert_eq!(err.error_type(), Some("StratifiedSplitError"));
        assert!(err.to_string().contains("bad split"));
    }

    #[tokio::test]
    async fn test_download_blob_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let saved: PathBuf = download_blob(b"zip", dir.path(), "../../etc/augmented.zip")
            .await
            .unwrap();

        assert_eq!(saved, dir.path().join("augmented.zip"));
        assert_eq!(std::fs::read(saved).unwrap(), b"zip");
    }
}
