//! OpenStack operations MCP server.
//!
//! Reads `MCP_*` and `OPENAI_*` settings plus OpenStack credentials (`OS_*` variables or
//! `clouds.yaml`) from the environment, then serves the OpenStack tools over stdio or HTTP.

use openstack_mcp::clients::openai::OpenAIClient;
use openstack_mcp::config::ServerConfig;
use openstack_mcp::event::LoggingEventHandler;
use openstack_mcp::mcp_server_builder::MCPServerBuilder;
use openstack_mcp::openstack::{CloudCredentials, OpenStackClient};
use openstack_mcp::tools::OpenStackToolProtocol;
use std::sync::Arc;

const INSTRUCTIONS: &str = "OpenStack operations tools. Use nova_list to find servers, then \
analyze_instance_errors, emergency_recovery_plan or custom_question_analysis for AI-assisted \
diagnosis of a single server, or bulk_infrastructure_analysis for many servers at once.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    openstack_mcp::init_logger();

    let config = ServerConfig::from_env()?;
    let credentials = CloudCredentials::from_env()?;
    log::info!(
        "connecting to {} as {}",
        credentials.auth_url,
        credentials.username
    );
    let cloud = OpenStackClient::connect(&credentials).await?;
    let llm = OpenAIClient::from_config(&config.llm);

    let tools = OpenStackToolProtocol::with_limits(
        Arc::new(cloud),
        Arc::new(llm),
        config.limits.clone(),
    );

    MCPServerBuilder::new()
        .with_server_info("openstack-mcp", env!("CARGO_PKG_VERSION"))
        .with_instructions(INSTRUCTIONS)
        .with_event_handler(Arc::new(LoggingEventHandler))
        .with_tool_protocol(Arc::new(tools))
        .await?
        .run(&config)
        .await
}
