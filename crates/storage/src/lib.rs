//! Backend and object-store access for Morph & Split.
//!
//! This crate provides the remote action client used by every orchestration
//! flow. Requests go through the [`Transport`] trait so the network can be
//! replaced in tests:
//!
//! - **HTTP Transport** - `reqwest` client bound to the backend base URL
//! - **Mock transports** - scripted responses, used by the integration tests
//!
//! # Session identity
//!
//! [`SessionIdentity`] issues the durable session id attached to every backend
//! request. It persists through a [`SessionStore`], either a JSON file in the
//! state directory or memory.
//!
//! # Object store
//!
//! Uploads and downloads go directly to cloud storage through signed URLs
//! issued by the backend; file bytes never pass through the backend itself.

mod client;
mod error;
mod http;
pub mod session;
mod traits;
mod types;

pub use client::{download_blob, ActionClient, Backend, SESSION_QUERY_PARAM};
pub use error::ClientError;
pub use http::HttpTransport;
pub use session::{
    FileSessionStore, MemorySessionStore, SessionIdentity, SessionStore, SESSION_FILE, SESSION_KEY,
};
pub use traits::Transport;
pub use types::{
    ApiRequest, ApiResponse, ClientSettings, FormPart, HttpMethod, RequestBody, UploadFile,
    UploadReport, DEFAULT_BASE_URL, DEFAULT_TIMEOUT,
};
