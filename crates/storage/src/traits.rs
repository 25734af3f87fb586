//! Transport seam between the action client and the network.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{ApiRequest, ApiResponse};

/// Low-level network operations - implemented by each transport.
///
/// The action client builds requests and interprets responses; a transport
/// only moves bytes. Tests swap in a scripted implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request to the backend.
    ///
    /// Any HTTP status is a successful send; only failures to get a response
    /// at all are errors.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError>;

    /// Upload bytes to a signed object-store URL.
    ///
    /// # Arguments
    /// * `url` - Signed URL issued by the backend
    /// * `content_type` - Value of the `Content-Type` header
    /// * `bytes` - Object content
    ///
    /// # Returns
    /// The HTTP status returned by the object store.
    async fn put_object(
        &self,
        url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<u16, ClientError>;

    /// Download an object from a signed URL.
    async fn get_object(&self, url: &str) -> Result<Vec<u8>, ClientError>;
}
