//! MCP Server Builder
//!
//! Simplifies creation and deployment of MCP servers with tools, resources, authentication and
//! IP filtering, over either HTTP or stdio.
//!
//! # Example
//!
//! ```rust,no_run
//! use openstack_mcp::mcp_server_builder::MCPServerBuilder;
//! use openstack_mcp::tools::security_review::{RuleLibrary, SecurityRulesResource};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let rules = Arc::new(RuleLibrary::load_dir("static")?);
//!
//!     let server = MCPServerBuilder::new()
//!         .with_server_info("development-mcp", "0.1.0")
//!         .with_resource_protocol(Arc::new(SecurityRulesResource::new(rules)))
//!         .await
//!         .allow_localhost_only()
//!         .with_bearer_token("my-secret-token")
//!         .start_on(8080)
//!         .await?;
//!
//!     println!("Server running at {}", server.addr());
//!     server.wait().await
//! }
//! ```

use crate::openstack_mcp::config::{ServerConfig, Transport};
use crate::openstack_mcp::event::EventHandler;
use crate::openstack_mcp::jsonrpc::McpDispatcher;
use crate::openstack_mcp::mcp_http_adapter::{
    HttpServerAdapter, HttpServerConfig, HttpServerInstance,
};
use crate::openstack_mcp::mcp_server::UnifiedMcpServer;
use crate::openstack_mcp::mcp_server_builder_utils::{AccessPolicy, AuthConfig, IpFilter};
use crate::openstack_mcp::resource_protocol::ResourceProtocol;
use crate::openstack_mcp::tool_protocol::ToolProtocol;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

/// Builder for creating MCP servers with a fluent API
pub struct MCPServerBuilder {
    server: UnifiedMcpServer,
    ip_filter: IpFilter,
    auth: AuthConfig,
    adapter: Option<Arc<dyn HttpServerAdapter>>,
    name: String,
    version: String,
    instructions: Option<String>,
}

impl MCPServerBuilder {
    /// Create a builder with no tools, no IP filtering, no authentication and the axum adapter
    /// (when the `mcp-server` feature is enabled).
    pub fn new() -> Self {
        Self {
            server: UnifiedMcpServer::new(),
            ip_filter: IpFilter::new(),
            auth: AuthConfig::None,
            adapter: Self::default_adapter(),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }

    #[cfg(feature = "mcp-server")]
    fn default_adapter() -> Option<Arc<dyn HttpServerAdapter>> {
        use crate::openstack_mcp::mcp_http_adapter::AxumHttpAdapter;
        Some(Arc::new(AxumHttpAdapter))
    }

    #[cfg(not(feature = "mcp-server"))]
    fn default_adapter() -> Option<Arc<dyn HttpServerAdapter>> {
        None
    }

    /// Name and version reported to clients in `initialize`.
    pub fn with_server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.name = name.into();
        self.version = version.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register every tool advertised by `protocol`.
    pub async fn with_tool_protocol(
        mut self,
        protocol: Arc<dyn ToolProtocol>,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let name = protocol.protocol_name().to_string();
        let count = self.server.register_protocol(protocol).await?;
        log::debug!("registered {} tools from {}", count, name);
        Ok(self)
    }

    /// Register a single tool name served by `protocol`.
    pub async fn with_custom_tool(
        mut self,
        tool_name: &str,
        protocol: Arc<dyn ToolProtocol>,
    ) -> Self {
        self.server.register_tool(tool_name, protocol).await;
        self
    }

    pub async fn with_resource_protocol(mut self, protocol: Arc<dyn ResourceProtocol>) -> Self {
        self.server.register_resources(protocol).await;
        self
    }

    /// Require `Authorization: Bearer <token>`
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthConfig::bearer(token);
        self
    }

    /// Require `Authorization: Basic <base64(username:password)>`
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = AuthConfig::basic(username, password);
        self
    }

    /// Allow a specific IP address such as `127.0.0.1` or `::1`
    pub fn allow_ip(mut self, ip: &str) -> Result<Self, String> {
        self.ip_filter.allow(ip)?;
        Ok(self)
    }

    /// Allow a CIDR block such as `10.0.0.0/8`
    pub fn allow_cidr(mut self, cidr: &str) -> Result<Self, String> {
        self.ip_filter.allow(cidr)?;
        Ok(self)
    }

    /// Allow only `127.0.0.1` and `::1`
    pub fn allow_localhost_only(mut self) -> Self {
        self.ip_filter = IpFilter::localhost();
        self
    }

    /// Apply the bearer token and allow-list from a [`ServerConfig`].
    pub fn with_access_from(mut self, config: &ServerConfig) -> Result<Self, String> {
        for entry in &config.allowed_ips {
            self.ip_filter.allow(entry)?;
        }
        if let Some(token) = &config.bearer_token {
            self.auth = AuthConfig::bearer(token.clone());
        }
        Ok(self)
    }

    /// Use a different HTTP framework adapter
    pub fn with_adapter(mut self, adapter: Arc<dyn HttpServerAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Attach an event handler for server lifecycle and request events.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.server = self.server.with_event_handler(handler);
        self
    }

    /// The IP filter and authentication the HTTP transport will enforce.
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.ip_filter.clone(), self.auth.clone())
    }

    /// Finish building and return the JSON-RPC dispatcher without starting a transport.
    pub fn build_dispatcher(&self) -> McpDispatcher {
        let dispatcher = McpDispatcher::new(self.server.clone(), &self.name, &self.version);
        match &self.instructions {
            Some(instructions) => dispatcher.with_instructions(instructions.clone()),
            None => dispatcher,
        }
    }

    /// Start the HTTP server on `127.0.0.1:<port>`
    pub async fn start_on(
        self,
        port: u16,
    ) -> Result<HttpServerInstance, Box<dyn Error + Send + Sync>> {
        self.start_at(SocketAddr::from(([127, 0, 0, 1], port))).await
    }

    /// Start the HTTP server at the specified address
    pub async fn start_at(
        self,
        addr: SocketAddr,
    ) -> Result<HttpServerInstance, Box<dyn Error + Send + Sync>> {
        let adapter = self.adapter.clone().ok_or(
            "no HTTP adapter available: enable the 'mcp-server' feature or call with_adapter()",
        )?;
        let config = HttpServerConfig {
            addr,
            access: self.access_policy(),
        };
        log::debug!("starting {} adapter on {}", adapter.name(), addr);
        adapter.start(config, self.build_dispatcher()).await
    }

    /// Serve JSON-RPC over stdin/stdout until stdin closes.
    pub async fn serve_stdio(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.build_dispatcher().serve_stdio().await?;
        Ok(())
    }

    /// Serve on the transport selected in `config` until the transport ends.
    pub async fn run(self, config: &ServerConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
        match config.transport {
            Transport::Stdio => self.serve_stdio().await,
            Transport::Http => {
                let instance = self.with_access_from(config)?.start_at(config.bind_addr).await?;
                instance.wait().await
            }
        }
    }
}

impl Default for MCPServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
