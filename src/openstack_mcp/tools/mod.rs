//! MCP tool implementations
//!
//! # Available Tools
//!
//! - **OpenStack**: server, image, network and flavor listings plus LLM-assisted console log
//!   analysis (single instance, bulk, recovery plans, free-form questions)
//! - **Security review**: development rule resources and the `analyze_code_secure` tool
//!
//! ```ignore
//! use openstack_mcp::tools::OpenStackToolProtocol;
//! use openstack_mcp::mcp_server_builder::MCPServerBuilder;
//! use std::sync::Arc;
//!
//! let tools = Arc::new(OpenStackToolProtocol::new(backend, llm));
//! let builder = MCPServerBuilder::new().with_tool_protocol(tools).await?;
//! ```

pub mod openstack;
pub mod security_review;

pub use openstack::OpenStackToolProtocol;
pub use security_review::{
    DevelopmentRule, RuleLibrary, SecurityReviewProtocol, SecurityRulesResource,
};
