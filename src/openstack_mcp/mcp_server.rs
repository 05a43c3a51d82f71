//! Unified MCP Server
//!
//! This module provides a concrete MCP server implementation that aggregates multiple tool
//! protocols and resource providers, routing each tool call to the protocol that registered the
//! tool name.
//!
//! The server is transport agnostic: the HTTP adapter and the JSON-RPC dispatcher both drive the
//! same `UnifiedMcpServer`.
//!
//! # Architecture
//!
//! ```text
//! OpenStackToolProtocol, SecurityReviewProtocol, ...
//!         ↓
//! UnifiedMcpServer (implements ToolProtocol)
//!         ↓
//! HTTP endpoints / JSON-RPC over stdio
//!         ↓
//! MCP clients
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use openstack_mcp::mcp_server::UnifiedMcpServer;
//! use openstack_mcp::tool_protocol::ToolProtocol;
//! use openstack_mcp::tools::security_review::{RuleLibrary, SecurityReviewProtocol};
//! # use openstack_mcp::client_wrapper::ClientWrapper;
//! use std::sync::Arc;
//!
//! # async fn demo(llm: Arc<dyn ClientWrapper>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let rules = Arc::new(RuleLibrary::load_dir("static")?);
//! let mut server = UnifiedMcpServer::new();
//! server
//!     .register_protocol(Arc::new(SecurityReviewProtocol::new(rules, llm)))
//!     .await?;
//!
//! let tools = server.list_tools().await?;
//! # Ok(())
//! # }
//! ```

use crate::openstack_mcp::event::{EventHandler, McpEvent};
use crate::openstack_mcp::resource_protocol::{ResourceError, ResourceMetadata, ResourceProtocol};
use crate::openstack_mcp::tool_protocol::{ToolError, ToolMetadata, ToolProtocol, ToolResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// A unified MCP server that aggregates multiple tools and resources
///
/// The server is thread-safe and can be shared across concurrent requests using
/// `Arc<UnifiedMcpServer>` or by cloning it: clones share the same registries.
#[derive(Clone, Default)]
pub struct UnifiedMcpServer {
    /// Map of tool name to its ToolProtocol implementation
    tools: Arc<RwLock<HashMap<String, Arc<dyn ToolProtocol>>>>,
    resources: Arc<RwLock<Vec<Arc<dyn ResourceProtocol>>>>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl UnifiedMcpServer {
    /// Create a new empty unified MCP server
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an event handler notified about every tool call and resource read.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn event_handler(&self) -> Option<&Arc<dyn EventHandler>> {
        self.event_handler.as_ref()
    }

    pub(crate) async fn emit(&self, event: McpEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_mcp_event(&event).await;
        }
    }

    /// Register a single tool name served by `protocol`
    pub async fn register_tool(&mut self, tool_name: &str, protocol: Arc<dyn ToolProtocol>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool_name.to_string(), protocol);
    }

    /// Register every tool a protocol advertises.
    ///
    /// Returns the number of tools registered. A later registration of the same tool name
    /// replaces the earlier one.
    pub async fn register_protocol(
        &mut self,
        protocol: Arc<dyn ToolProtocol>,
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let advertised = protocol.list_tools().await?;
        let mut tools = self.tools.write().await;
        for meta in &advertised {
            if tools
                .insert(meta.name.clone(), Arc::clone(&protocol))
                .is_some()
            {
                log::warn!(
                    "tool {} re-registered by protocol {}",
                    meta.name,
                    protocol.protocol_name()
                );
            }
        }
        Ok(advertised.len())
    }

    /// Unregister a tool from the server
    pub async fn unregister_tool(&mut self, tool_name: &str) {
        let mut tools = self.tools.write().await;
        tools.remove(tool_name);
    }

    /// Check if a tool is registered
    pub async fn has_tool(&self, tool_name: &str) -> bool {
        let tools = self.tools.read().await;
        tools.contains_key(tool_name)
    }

    /// Get the number of registered tools
    pub async fn tool_count(&self) -> usize {
        let tools = self.tools.read().await;
        tools.len()
    }

    /// Register a resource provider
    pub async fn register_resources(&mut self, protocol: Arc<dyn ResourceProtocol>) {
        self.resources.write().await.push(protocol);
    }

    /// Whether any resource provider is registered
    pub async fn has_resources(&self) -> bool {
        !self.resources.read().await.is_empty()
    }

    /// List resources across all providers; a failing provider is logged and skipped.
    pub async fn list_resources(
        &self,
    ) -> Result<Vec<ResourceMetadata>, Box<dyn Error + Send + Sync>> {
        let providers: Vec<Arc<dyn ResourceProtocol>> =
            self.resources.read().await.iter().cloned().collect();

        let mut all = Vec::new();
        for provider in providers {
            match provider.list_resources().await {
                Ok(mut list) => all.append(&mut list),
                Err(e) => log::error!(
                    "error listing resources from {}: {}",
                    provider.protocol_name(),
                    e
                ),
            }
        }
        Ok(all)
    }

    /// Read a resource from the first provider that lists its URI.
    pub async fn read_resource(&self, uri: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let providers: Vec<Arc<dyn ResourceProtocol>> =
            self.resources.read().await.iter().cloned().collect();

        let mut result: Result<String, Box<dyn Error + Send + Sync>> =
            Err(Box::new(ResourceError::NotFound(uri.to_string())));
        for provider in providers {
            let listed = provider.list_resources().await.unwrap_or_default();
            if listed.iter().any(|r| r.uri == uri) {
                result = provider.read_resource(uri).await;
                break;
            }
        }

        self.emit(McpEvent::ResourceRead {
            uri: uri.to_string(),
            success: result.is_ok(),
        })
        .await;
        result
    }
}

#[async_trait]
impl ToolProtocol for UnifiedMcpServer {
    /// Execute a tool by routing to the protocol that registered it
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        self.emit(McpEvent::ToolCallReceived {
            tool_name: tool_name.to_string(),
            parameters: parameters.clone(),
        })
        .await;

        let protocol = self.tools.read().await.get(tool_name).cloned();
        let protocol = match protocol {
            Some(protocol) => protocol,
            None => {
                let err = ToolError::NotFound(tool_name.to_string());
                self.emit(McpEvent::ToolError {
                    source: "routing".to_string(),
                    tool_name: tool_name.to_string(),
                    error: err.to_string(),
                })
                .await;
                return Err(Box::new(err));
            }
        };

        let started = Instant::now();
        match protocol.execute(tool_name, parameters).await {
            Ok(result) => {
                self.emit(McpEvent::ToolCallCompleted {
                    tool_name: tool_name.to_string(),
                    success: result.success,
                    error: result.error.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                })
                .await;
                Ok(result)
            }
            Err(e) => {
                self.emit(McpEvent::ToolError {
                    source: protocol.protocol_name().to_string(),
                    tool_name: tool_name.to_string(),
                    error: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    /// List all registered tools, sorted by name
    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        self.emit(McpEvent::ToolListRequested).await;

        let mut entries: Vec<(String, Arc<dyn ToolProtocol>)> = self
            .tools
            .read()
            .await
            .iter()
            .map(|(name, protocol)| (name.clone(), Arc::clone(protocol)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut all_tools = Vec::with_capacity(entries.len());
        for (name, protocol) in entries {
            match protocol.get_tool_metadata(&name).await {
                Ok(meta) => all_tools.push(meta),
                Err(e) => log::error!("error reading metadata for tool {}: {}", name, e),
            }
        }

        self.emit(McpEvent::ToolListReturned {
            tool_count: all_tools.len(),
        })
        .await;
        Ok(all_tools)
    }

    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
        let protocol = self
            .tools
            .read()
            .await
            .get(tool_name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;
        protocol.get_tool_metadata(tool_name).await
    }

    fn protocol_name(&self) -> &str {
        "unified-mcp-server"
    }
}
