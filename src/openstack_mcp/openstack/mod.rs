//! OpenStack cloud collaborator.
//!
//! The MCP tools only need a handful of read operations from Nova, Glance and Neutron. They
//! reach them through the [`ComputeBackend`] trait so the tools can be exercised against an
//! in-memory backend in tests; [`OpenStackClient`] is the REST implementation used in
//! production.
//!
//! # Architecture
//!
//! ```text
//! CloudCredentials (env / clouds.yaml)
//!         ↓
//! Session (Keystone v3 token + service catalog)
//!         ↓
//! OpenStackClient (implements ComputeBackend)
//!         ↓
//! OpenStackToolProtocol (MCP tools)
//! ```

pub mod auth;
pub mod client;
pub mod models;

pub use auth::{CloudCredentials, Session};
pub use client::OpenStackClient;
pub use models::{Flavor, Image, Network, Server, ServerQuery};

use async_trait::async_trait;
use std::fmt;

/// Error types for cloud operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    /// Credentials are missing or incomplete.
    Configuration(String),
    /// Keystone rejected the credentials or returned no token.
    Authentication(String),
    /// The service catalog has no usable endpoint for a service type.
    EndpointNotFound(String),
    /// Transport-level failure (connect, timeout, TLS).
    Http(String),
    /// The API answered with a non-success status.
    Api { status: u16, message: String },
    /// The response body could not be decoded.
    Decode(String),
}

impl fmt::Display for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudError::Configuration(msg) => write!(f, "Cloud configuration error: {}", msg),
            CloudError::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            CloudError::EndpointNotFound(service) => {
                write!(f, "No endpoint found for service type: {}", service)
            }
            CloudError::Http(msg) => write!(f, "HTTP error: {}", msg),
            CloudError::Api { status, message } => {
                write!(f, "API returned status {}: {}", status, message)
            }
            CloudError::Decode(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for CloudError {}

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CloudError::Decode(err.to_string())
        } else {
            CloudError::Http(err.to_string())
        }
    }
}

/// Read operations the MCP tools need from the cloud.
///
/// Every call goes straight to the control plane: there is no caching, retrying or pagination.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    /// List servers with full details, optionally filtered by status.
    async fn list_servers(&self, query: &ServerQuery) -> Result<Vec<Server>, CloudError>;

    /// Look a server up by ID, falling back to an exact name match.
    ///
    /// Returns `Ok(None)` when nothing matches.
    async fn get_server(&self, name_or_id: &str) -> Result<Option<Server>, CloudError>;

    /// Fetch the last `length` lines of a server's console output.
    async fn console_output(&self, server: &Server, length: usize) -> Result<String, CloudError>;

    async fn list_images(&self, public_only: bool) -> Result<Vec<Image>, CloudError>;

    async fn list_networks(&self, external_only: bool) -> Result<Vec<Network>, CloudError>;

    async fn list_flavors(&self, public_only: bool) -> Result<Vec<Flavor>, CloudError>;
}
