//! Development MCP server: publishes the security rules and reviews code against them.

use openstack_mcp::clients::openai::OpenAIClient;
use openstack_mcp::config::ServerConfig;
use openstack_mcp::event::LoggingEventHandler;
use openstack_mcp::mcp_server_builder::MCPServerBuilder;
use openstack_mcp::tools::{RuleLibrary, SecurityReviewProtocol, SecurityRulesResource};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    openstack_mcp::init_logger();

    let config = ServerConfig::from_env()?;
    let rules = Arc::new(RuleLibrary::load_dir(&config.rules_dir)?);
    log::info!("serving rules from {}", rules.dir().display());
    let llm = Arc::new(OpenAIClient::from_config(&config.llm));

    MCPServerBuilder::new()
        .with_server_info("development-mcp", env!("CARGO_PKG_VERSION"))
        .with_event_handler(Arc::new(LoggingEventHandler))
        .with_resource_protocol(Arc::new(SecurityRulesResource::new(rules.clone())))
        .await
        .with_tool_protocol(Arc::new(SecurityReviewProtocol::new(rules, llm)))
        .await?
        .run(&config)
        .await
}
