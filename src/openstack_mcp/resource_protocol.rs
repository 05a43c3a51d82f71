//! Resource Protocol Abstraction
//!
//! MCP resources are read-only documents the server hands to clients, such as the development
//! security rules. Tools act; resources inform.
//!
//! # Example
//!
//! ```rust
//! use openstack_mcp::resource_protocol::{ResourceMetadata, ResourceProtocol};
//!
//! struct Runbook;
//!
//! #[async_trait::async_trait]
//! impl ResourceProtocol for Runbook {
//!     async fn list_resources(&self) -> Result<Vec<ResourceMetadata>, Box<dyn std::error::Error + Send + Sync>> {
//!         Ok(vec![ResourceMetadata::new("resource://runbook", "Operator runbook")
//!             .with_name("Runbook")
//!             .with_mime_type("text/markdown")])
//!     }
//!
//!     async fn read_resource(&self, uri: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
//!         match uri {
//!             "resource://runbook" => Ok("# Runbook".to_string()),
//!             _ => Err("Not found".into()),
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;

/// Metadata describing a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Unique resource identifier, e.g. `resource://security-rules`
    pub uri: String,
    /// Short display name
    pub name: Option<String>,
    /// Human-readable description of the resource
    pub description: String,
    /// Optional MIME type of the resource content
    pub mime_type: Option<String>,
    /// Additional metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ResourceMetadata {
    /// Create a new resource with URI and description
    pub fn new(uri: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            description: description.into(),
            mime_type: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the MIME type for this resource
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Add metadata to the resource
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// MCP `resources/list` entry.
    pub fn to_mcp_json(&self) -> serde_json::Value {
        let mut entry = serde_json::json!({
            "uri": self.uri,
            "name": self.name.clone().unwrap_or_else(|| self.uri.clone()),
            "description": self.description,
        });
        if let Some(mime) = &self.mime_type {
            entry["mimeType"] = serde_json::Value::String(mime.clone());
        }
        entry
    }
}

/// Trait for implementing resource protocols
#[async_trait]
pub trait ResourceProtocol: Send + Sync {
    /// List all available resources
    async fn list_resources(&self) -> Result<Vec<ResourceMetadata>, Box<dyn Error + Send + Sync>>;

    /// Read the content of a resource by URI
    async fn read_resource(&self, uri: &str) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Protocol identifier used in logs
    fn protocol_name(&self) -> &str {
        "resource"
    }
}

/// Error types for resource operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Requested resource is not available
    NotFound(String),
    /// Permission denied reading this resource
    PermissionDenied(String),
    /// Invalid URI format
    InvalidUri(String),
    /// Protocol error
    ProtocolError(String),
}

impl std::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceError::NotFound(uri) => write!(f, "Resource not found: {}", uri),
            ResourceError::PermissionDenied(uri) => write!(f, "Permission denied: {}", uri),
            ResourceError::InvalidUri(uri) => write!(f, "Invalid URI: {}", uri),
            ResourceError::ProtocolError(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl std::error::Error for ResourceError {}
