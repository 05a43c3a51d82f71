//! MCP server event system.
//!
//! Provides a callback-based observability layer for the MCP servers. Implement
//! [`EventHandler`] to receive notifications about:
//!
//! - **Server lifecycle**: when a transport starts listening
//! - **Tool operations**: listing, call receipt and completion with timing
//! - **Resources**: reads of served documents
//! - **Access control**: requests rejected by IP filtering or authentication
//!
//! The handler is wrapped in `Arc<dyn EventHandler>` and shared by every transport. The default
//! [`LoggingEventHandler`] forwards events to the `log` facade.
//!
//! # Example
//!
//! ```rust
//! use openstack_mcp::event::{EventHandler, McpEvent};
//! use async_trait::async_trait;
//!
//! struct SlowCallAlarm;
//!
//! #[async_trait]
//! impl EventHandler for SlowCallAlarm {
//!     async fn on_mcp_event(&self, event: &McpEvent) {
//!         if let McpEvent::ToolCallCompleted { tool_name, duration_ms, .. } = event {
//!             if *duration_ms > 30_000 {
//!                 eprintln!("{} took {} ms", tool_name, duration_ms);
//!             }
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;

/// Events emitted by [`UnifiedMcpServer`](crate::mcp_server::UnifiedMcpServer) and its
/// transports.
///
/// # Event Flow (during a typical `tools/call`)
///
/// ```text
/// ToolCallReceived
///   └─ ToolCallCompleted { success, duration_ms }
///      or ToolError (unknown tool, protocol error)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum McpEvent {
    /// A transport is ready to accept requests.
    ServerStarted {
        /// `"http"` or `"stdio"`.
        transport: String,
        /// Bound address for HTTP, `None` for stdio.
        addr: Option<String>,
    },

    /// A client asked for the tool list.
    ToolListRequested,

    /// The tool list was returned.
    ToolListReturned {
        tool_count: usize,
    },

    /// A tool call arrived and is about to be routed.
    ToolCallReceived {
        tool_name: String,
        parameters: serde_json::Value,
    },

    /// A tool call returned a [`ToolResult`](crate::tool_protocol::ToolResult).
    ///
    /// `success` mirrors the result; failures reported inside the result (for example an
    /// unreachable cloud) arrive here rather than as [`ToolError`](McpEvent::ToolError).
    ToolCallCompleted {
        tool_name: String,
        success: bool,
        /// Error message of a failed result.
        error: Option<String>,
        duration_ms: u64,
    },

    /// Routing or the protocol itself failed before a result could be produced.
    ToolError {
        /// Where the failure happened: `"routing"` or the protocol name.
        source: String,
        tool_name: String,
        error: String,
    },

    /// A resource was read.
    ResourceRead {
        uri: String,
        success: bool,
    },

    /// A request was refused before reaching any tool.
    RequestRejected {
        /// Client address when known.
        client: Option<String>,
        reason: String,
    },
}

/// Receives [`McpEvent`]s. The default implementation ignores everything.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_mcp_event(&self, _event: &McpEvent) {}
}

/// Writes every event to the `log` facade at a level matching its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn on_mcp_event(&self, event: &McpEvent) {
        match event {
            McpEvent::ServerStarted { transport, addr } => match addr {
                Some(addr) => log::info!("MCP server listening on {} ({})", addr, transport),
                None => log::info!("MCP server started on {}", transport),
            },
            McpEvent::ToolListRequested => log::debug!("tool list requested"),
            McpEvent::ToolListReturned { tool_count } => {
                log::debug!("returned {} tools", tool_count)
            }
            McpEvent::ToolCallReceived { tool_name, .. } => {
                log::info!("tool call: {}", tool_name)
            }
            McpEvent::ToolCallCompleted {
                tool_name,
                success: true,
                duration_ms,
                ..
            } => log::info!("tool {} completed in {} ms", tool_name, duration_ms),
            McpEvent::ToolCallCompleted {
                tool_name,
                error,
                duration_ms,
                ..
            } => log::warn!(
                "tool {} failed after {} ms: {}",
                tool_name,
                duration_ms,
                error.as_deref().unwrap_or("unknown error")
            ),
            McpEvent::ToolError {
                source,
                tool_name,
                error,
            } => log::error!("tool {} error ({}): {}", tool_name, source, error),
            McpEvent::ResourceRead { uri, success } => {
                if *success {
                    log::debug!("resource read: {}", uri)
                } else {
                    log::warn!("resource read failed: {}", uri)
                }
            }
            McpEvent::RequestRejected { client, reason } => log::warn!(
                "rejected request from {}: {}",
                client.as_deref().unwrap_or("unknown client"),
                reason
            ),
        }
    }
}
