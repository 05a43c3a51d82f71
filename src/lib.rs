//! # OpenStack MCP
//!
//! Model Context Protocol (MCP) tool servers for OpenStack operations.
//!
//! The crate provides:
//!
//! * **Error-pattern extraction**: [`log_analysis`] scans console logs for failure keywords and
//!   returns each hit with its surrounding lines
//! * **OpenStack access**: [`openstack`] authenticates against Keystone and reads Nova, Glance
//!   and Neutron through the [`openstack::ComputeBackend`] trait
//! * **LLM-assisted analysis**: [`tools::OpenStackToolProtocol`] turns scan results into prompts
//!   and Markdown reports through any [`ClientWrapper`]
//! * **Server deployment**: [`mcp_server_builder::MCPServerBuilder`] serves tools and resources
//!   as JSON-RPC over stdio, or over HTTP with bearer authentication and IP filtering
//!
//! Two binaries ship with the crate: `openstack-mcp` (the operations server) and
//! `development-mcp` (security rules plus LLM code review).
//!
//! ## Scanning a log
//!
//! ```rust
//! use openstack_mcp::log_analysis::{ErrorPatternExtractor, KeywordSet};
//!
//! let log = "boot ok\nkernel panic - not syncing\nreboot";
//! let scan = ErrorPatternExtractor::new(KeywordSet::default()).extract(log);
//!
//! assert_eq!(scan.error_count, 1);
//! assert_eq!(scan.total_lines, 3);
//! assert_eq!(scan.error_lines[0].context_after, vec!["reboot"]);
//! ```
//!
//! ## Serving the OpenStack tools
//!
//! ```rust,no_run
//! use openstack_mcp::clients::openai::OpenAIClient;
//! use openstack_mcp::config::ServerConfig;
//! use openstack_mcp::mcp_server_builder::MCPServerBuilder;
//! use openstack_mcp::openstack::{CloudCredentials, OpenStackClient};
//! use openstack_mcp::tools::OpenStackToolProtocol;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     openstack_mcp::init_logger();
//!     let config = ServerConfig::from_env()?;
//!     let cloud = OpenStackClient::connect(&CloudCredentials::from_env()?).await?;
//!     let llm = OpenAIClient::from_config(&config.llm);
//!
//!     let tools = OpenStackToolProtocol::with_limits(
//!         Arc::new(cloud),
//!         Arc::new(llm),
//!         config.limits.clone(),
//!     );
//!     MCPServerBuilder::new()
//!         .with_tool_protocol(Arc::new(tools))
//!         .await?
//!         .run(&config)
//!         .await
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Output goes to stderr, so it never interleaves with the stdio transport.
///
/// ```rust
/// openstack_mcp::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `openstack_mcp` module.
pub mod openstack_mcp;

// Re-exporting key items for easier external access.
pub use openstack_mcp::client_wrapper;
pub use openstack_mcp::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
pub use openstack_mcp::clients;
pub use openstack_mcp::config;
pub use openstack_mcp::config::{AnalysisLimits, ServerConfig, Transport};
pub use openstack_mcp::event;
pub use openstack_mcp::event::{EventHandler, LoggingEventHandler, McpEvent};
pub use openstack_mcp::jsonrpc;
pub use openstack_mcp::log_analysis;
pub use openstack_mcp::log_analysis::{
    extract_error_patterns, ErrorPatternExtractor, KeywordSet, MatchRecord, ScanResult,
};
pub use openstack_mcp::mcp_http_adapter;
pub use openstack_mcp::mcp_server;
pub use openstack_mcp::mcp_server::UnifiedMcpServer;
pub use openstack_mcp::mcp_server_builder;
pub use openstack_mcp::mcp_server_builder_utils;
pub use openstack_mcp::openstack;
pub use openstack_mcp::resource_protocol;
pub use openstack_mcp::sampling;
pub use openstack_mcp::tool_protocol;
pub use openstack_mcp::tool_protocol::{ToolMetadata, ToolProtocol, ToolResult};
pub use openstack_mcp::tools;
