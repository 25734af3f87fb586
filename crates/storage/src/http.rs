//! `reqwest` implementation of [`Transport`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::error::ClientError;
use crate::traits::Transport;
use crate::types::{ApiRequest, ApiResponse, ClientSettings, FormPart, HttpMethod, RequestBody};

/// Talks to the backend and to signed object-store URLs over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport from settings.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if the HTTP client cannot be built
    /// or the base URL is empty.
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let base_url: String = settings.normalized_base_url().to_string();
        if base_url.is_empty() {
            return Err(ClientError::InvalidConfig {
                message: "backend base URL is empty".into(),
            });
        }

        let client: reqwest::Client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| ClientError::InvalidConfig {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    fn form(parts: Vec<FormPart>) -> Result<Form, ClientError> {
        let mut form: Form = Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File {
                    name,
                    filename,
                    content_type,
                    bytes,
                } => {
                    let file_part: Part = Part::bytes(bytes)
                        .file_name(filename)
                        .mime_str(&content_type)
                        .map_err(|e| ClientError::InvalidConfig {
                            message: format!("invalid content type '{}': {}", content_type, e),
                        })?;
                    form.part(name, file_part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let url: String = self.url_for(&request.path);
        debug!(method = %request.method, url = %url, "Sending backend request");

        let mut builder: reqwest::RequestBuilder = self
            .client
            .request(Self::method(request.method), &url)
            .query(&request.query);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(parts) => builder.multipart(Self::form(parts)?),
        };

        let response: reqwest::Response = builder
            .send()
            .await
            .map_err(|e| ClientError::transport(&request.path, e))?;
        let status: u16 = response.status().as_u16();
        let body: Vec<u8> = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport(&request.path, e))?
            .to_vec();

        debug!(path = %request.path, status, bytes = body.len(), "Backend responded");
        Ok(ApiResponse { status, body })
    }

    async fn put_object(
        &self,
        url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<u16, ClientError> {
        let response: reqwest::Response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ClientError::transport("object store", e))?;
        Ok(response.status().as_u16())
    }

    async fn get_object(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        let response: reqwest::Response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::transport("object store", e))?;

        let status: u16 = response.status().as_u16();
        if !response.status().is_success() {
            return Err(ClientError::Http {
                path: "object store".into(),
                status,
                body: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport("object store", e))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        let settings: ClientSettings = ClientSettings::default().with_base_url("http://host:5000/");
        let transport: HttpTransport = HttpTransport::new(&settings).unwrap();

        assert_eq!(transport.base_url(), "http://host:5000");
        assert_eq!(transport.url_for("/augment"), "http://host:5000/augment");
        assert_eq!(transport.url_for("gcs/create_bucket"), "http://host:5000/gcs/create_bucket");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let settings: ClientSettings = ClientSettings::default().with_base_url("/");
        assert!(matches!(
            HttpTransport::new(&settings),
            Err(ClientError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_form_rejects_bad_mime() {
        let parts: Vec<FormPart> = vec![FormPart::File {
            name: "stratificationDataFile".into(),
            filename: "f.csv".into(),
            content_type: "not a mime".into(),
            bytes: Vec::new(),
        }];
        assert!(HttpTransport::form(parts).is_err());
    }
}
