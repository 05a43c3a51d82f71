//! OpenStack operations and LLM-assisted console log analysis, exposed as MCP tools.
//!
//! | Tool | Purpose |
//! |---|---|
//! | `nova_list` | List servers, optionally filtered by status |
//! | `nova_show` | Full detail of one server |
//! | `nova_console_log` | Tail of a server's console log |
//! | `analyze_instance_errors` | Scan the console log and ask the LLM for a diagnosis |
//! | `bulk_infrastructure_analysis` | Scan many servers and ask for infrastructure-level insights |
//! | `emergency_recovery_plan` | LLM-generated recovery plan for a broken server |
//! | `custom_question_analysis` | Answer a free-form question about a server |
//! | `glance_list_images` | List images |
//! | `neutron_list_networks` | List networks |
//! | `nova_list_flavors` | List flavors |
//!
//! Cloud and LLM failures never escape as protocol errors: they are returned as a failed
//! [`ToolResult`] whose message names the operation, e.g. `Error listing servers: ...`.

use crate::openstack_mcp::client_wrapper::ClientWrapper;
use crate::openstack_mcp::config::AnalysisLimits;
use crate::openstack_mcp::log_analysis::{ErrorPatternExtractor, KeywordSet, ScanResult};
use crate::openstack_mcp::openstack::{ComputeBackend, Server, ServerQuery};
use crate::openstack_mcp::sampling;
use crate::openstack_mcp::tool_protocol::{
    optional_bool, optional_str, optional_usize, required_str, ToolError, ToolMetadata,
    ToolParameter, ToolParameterType, ToolProtocol, ToolResult,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

pub const NOVA_LIST: &str = "nova_list";
pub const NOVA_SHOW: &str = "nova_show";
pub const NOVA_CONSOLE_LOG: &str = "nova_console_log";
pub const ANALYZE_INSTANCE_ERRORS: &str = "analyze_instance_errors";
pub const BULK_INFRASTRUCTURE_ANALYSIS: &str = "bulk_infrastructure_analysis";
pub const EMERGENCY_RECOVERY_PLAN: &str = "emergency_recovery_plan";
pub const CUSTOM_QUESTION_ANALYSIS: &str = "custom_question_analysis";
pub const GLANCE_LIST_IMAGES: &str = "glance_list_images";
pub const NEUTRON_LIST_NETWORKS: &str = "neutron_list_networks";
pub const NOVA_LIST_FLAVORS: &str = "nova_list_flavors";

const ANALYSIS_FALLBACK: &str = "The AI analysis could not be completed.";
const RECOVERY_FALLBACK: &str = "A recovery plan could not be generated.";
const ANSWER_FALLBACK: &str = "An answer could not be generated.";

/// Context lines quoted per side of each match in analysis prompts.
const PROMPT_CONTEXT_LINES: usize = 2;

/// Tool protocol serving the OpenStack tool set.
pub struct OpenStackToolProtocol {
    backend: Arc<dyn ComputeBackend>,
    llm: Arc<dyn ClientWrapper>,
    extractor: ErrorPatternExtractor,
    limits: AnalysisLimits,
}

type ToolOutcome = Result<String, String>;

impl OpenStackToolProtocol {
    pub fn new(backend: Arc<dyn ComputeBackend>, llm: Arc<dyn ClientWrapper>) -> Self {
        Self::with_limits(backend, llm, AnalysisLimits::default())
    }

    /// Build with custom limits; the extractor uses the default keywords with the limits'
    /// record cap and context window.
    pub fn with_limits(
        backend: Arc<dyn ComputeBackend>,
        llm: Arc<dyn ClientWrapper>,
        limits: AnalysisLimits,
    ) -> Self {
        let extractor = ErrorPatternExtractor::new(KeywordSet::default())
            .with_max_records(limits.max_scan_records)
            .with_context_lines(limits.context_lines);
        Self {
            backend,
            llm,
            extractor,
            limits,
        }
    }

    /// Replace the extractor, e.g. to add site-specific keywords.
    pub fn with_extractor(mut self, extractor: ErrorPatternExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn limits(&self) -> &AnalysisLimits {
        &self.limits
    }

    fn server_id_param() -> ToolParameter {
        ToolParameter::new("server_id", ToolParameterType::String)
            .with_description("Server ID or name")
            .required()
    }

    fn tool_catalog(&self) -> Vec<ToolMetadata> {
        vec![
            ToolMetadata::new(NOVA_LIST, "List Nova servers")
                .with_parameter(
                    ToolParameter::new("detailed", ToolParameterType::Boolean)
                        .with_description("Include flavor, image, addresses and state details")
                        .with_default(json!(false)),
                )
                .with_parameter(
                    ToolParameter::new("status", ToolParameterType::String)
                        .with_description("Filter by status (ACTIVE, SHUTOFF, ERROR, ...)"),
                ),
            ToolMetadata::new(NOVA_SHOW, "Show the details of one server")
                .with_parameter(Self::server_id_param()),
            ToolMetadata::new(NOVA_CONSOLE_LOG, "Fetch a server's console log")
                .with_parameter(Self::server_id_param())
                .with_parameter(
                    ToolParameter::new("length", ToolParameterType::Integer)
                        .with_description("Number of trailing lines to fetch")
                        .with_default(json!(self.limits.console_log_lines)),
                ),
            ToolMetadata::new(
                ANALYZE_INSTANCE_ERRORS,
                "Scan a server's console log for errors and get an AI diagnosis",
            )
            .with_parameter(Self::server_id_param())
            .with_parameter(
                ToolParameter::new("log_lines", ToolParameterType::Integer)
                    .with_description("Number of console log lines to analyze")
                    .with_default(json!(self.limits.analysis_log_lines)),
            ),
            ToolMetadata::new(
                BULK_INFRASTRUCTURE_ANALYSIS,
                "Scan many servers' console logs and get infrastructure-level insights",
            )
            .with_parameter(
                ToolParameter::new("status_filter", ToolParameterType::String)
                    .with_description("Only analyze servers with this status"),
            )
            .with_parameter(
                ToolParameter::new("max_instances", ToolParameterType::Integer)
                    .with_description("Maximum number of servers to analyze")
                    .with_default(json!(self.limits.bulk_max_instances)),
            ),
            ToolMetadata::new(
                EMERGENCY_RECOVERY_PLAN,
                "Generate an AI emergency recovery plan for a server",
            )
            .with_parameter(Self::server_id_param()),
            ToolMetadata::new(
                CUSTOM_QUESTION_ANALYSIS,
                "Ask the AI a free-form question about a server",
            )
            .with_parameter(Self::server_id_param())
            .with_parameter(
                ToolParameter::new("question", ToolParameterType::String)
                    .with_description("The question to answer")
                    .required(),
            ),
            ToolMetadata::new(GLANCE_LIST_IMAGES, "List Glance images").with_parameter(
                ToolParameter::new("public_only", ToolParameterType::Boolean)
                    .with_description("Only list public images")
                    .with_default(json!(false)),
            ),
            ToolMetadata::new(NEUTRON_LIST_NETWORKS, "List Neutron networks").with_parameter(
                ToolParameter::new("external_only", ToolParameterType::Boolean)
                    .with_description("Only list external networks")
                    .with_default(json!(false)),
            ),
            ToolMetadata::new(NOVA_LIST_FLAVORS, "List Nova flavors").with_parameter(
                ToolParameter::new("public_only", ToolParameterType::Boolean)
                    .with_description("Only list public flavors")
                    .with_default(json!(false)),
            ),
        ]
    }

    async fn find_server(&self, server_id: &str, context: &str) -> Result<Server, String> {
        match self.backend.get_server(server_id).await {
            Ok(Some(server)) => Ok(server),
            Ok(None) => Err(format!("Server not found: {}", server_id)),
            Err(e) => Err(format!("{}: {}", context, e)),
        }
    }

    async fn nova_list(&self, detailed: bool, status: Option<&str>) -> ToolOutcome {
        let query = match status {
            Some(status) => ServerQuery::new().with_status(status),
            None => ServerQuery::new(),
        };
        let servers = self
            .backend
            .list_servers(&query)
            .await
            .map_err(|e| format!("Error listing servers: {}", e))?;

        if servers.is_empty() {
            return Ok("No servers found".to_string());
        }

        let listing: Vec<Value> = servers
            .iter()
            .map(|server| {
                if detailed {
                    json!({
                        "id": server.id,
                        "name": server.name,
                        "status": server.status,
                        "flavor": server.flavor_label(),
                        "image": server.image_label(),
                        "created": server.created,
                        "updated": server.updated,
                        "addresses": server.addresses,
                        "power_state": server.power_state_name(),
                        "vm_state": server.vm_state.as_deref().unwrap_or("N/A"),
                    })
                } else {
                    json!({"id": server.id, "name": server.name, "status": server.status})
                }
            })
            .collect();
        Ok(pretty(&Value::Array(listing)))
    }

    async fn nova_show(&self, server_id: &str) -> ToolOutcome {
        let server = self
            .find_server(server_id, "Error getting server details")
            .await?;
        Ok(pretty(&json!({
            "id": server.id,
            "name": server.name,
            "status": server.status,
            "flavor": server.flavor,
            "image": server.image,
            "created": server.created,
            "updated": server.updated,
            "addresses": server.addresses,
            "metadata": server.metadata,
            "fault": server.fault,
            "key_name": server.key_name,
            "security_groups": server.security_groups,
            "availability_zone": server.availability_zone,
            "power_state": server.power_state_name(),
            "task_state": server.task_state.as_deref().unwrap_or("N/A"),
            "vm_state": server.vm_state.as_deref().unwrap_or("N/A"),
        })))
    }

    async fn nova_console_log(&self, server_id: &str, length: usize) -> ToolOutcome {
        const CONTEXT: &str = "Error getting console log";
        let server = self.find_server(server_id, CONTEXT).await?;
        let console = self
            .backend
            .console_output(&server, length)
            .await
            .map_err(|e| format!("{}: {}", CONTEXT, e))?;

        if console.is_empty() {
            return Err(format!("No console log available for {}", server.name));
        }
        Ok(format!(
            "Console log for {} (last {} lines):\n\n{}",
            server.name, length, console
        ))
    }

    async fn analyze_instance_errors(&self, server_id: &str, log_lines: usize) -> ToolOutcome {
        let context = format!("Error analyzing server {}", server_id);
        log::info!("analyzing server {}", server_id);

        let server = self.find_server(server_id, &context).await?;
        let console = self
            .backend
            .console_output(&server, log_lines)
            .await
            .map_err(|e| format!("{}: {}", context, e))?;
        if console.is_empty() {
            return Err(format!(
                "No console log available for server: {}",
                server.name
            ));
        }

        let scan = self.extractor.extract(&console);
        if !scan.has_errors {
            return Ok(format!(
                "No obvious errors found in {} console log. Instance appears healthy.",
                server.name
            ));
        }

        log::info!(
            "found {} potential errors on {}, requesting AI analysis",
            scan.error_count,
            server.name
        );
        let prompt = instance_analysis_prompt(&server, &scan, &console, &self.limits);
        let analysis = sampling::sample(self.llm.as_ref(), None, &prompt, ANALYSIS_FALLBACK)
            .await
            .map_err(|e| format!("{}: {}", context, e))?;

        Ok(format!(
            "# AI OpenStack Instance Error Analysis\n\n\
             ## Server\n\
             - **ID**: {}\n\
             - **Name**: {}\n\
             - **Status**: {}\n\
             - **Errors found**: {}\n\n\
             ## AI Analysis\n\n\
             {}\n\n\
             ---\n\
             *Analyzed at: {}*\n",
            server.id,
            server.name,
            server.status,
            scan.error_count,
            analysis,
            timestamp()
        ))
    }

    async fn bulk_infrastructure_analysis(
        &self,
        status_filter: Option<&str>,
        max_instances: usize,
    ) -> ToolOutcome {
        const CONTEXT: &str = "Error in bulk analysis";
        log::info!("starting bulk infrastructure analysis");

        let query = match status_filter {
            Some(status) => ServerQuery::new().with_status(status),
            None => ServerQuery::new(),
        };
        let mut servers = self
            .backend
            .list_servers(&query)
            .await
            .map_err(|e| format!("{}: {}", CONTEXT, e))?;
        servers.truncate(max_instances);

        if servers.is_empty() {
            return Err("No servers found for analysis".to_string());
        }

        let mut instances = Vec::with_capacity(servers.len());
        let mut problematic = Vec::new();

        for server in &servers {
            log::info!("analyzing {}", server.name);
            match self
                .backend
                .console_output(server, self.limits.bulk_log_lines)
                .await
            {
                Ok(console) => {
                    let scan = self.extractor.extract(&console);
                    let entry = json!({
                        "id": server.id,
                        "name": server.name,
                        "status": server.status,
                        "has_errors": scan.has_errors,
                        "error_count": scan.error_count,
                        "fault": server.fault,
                        "created": server.created,
                        "sample_errors": scan.sample_errors(self.limits.bulk_sample_errors),
                    });
                    if scan.has_errors || server.is_error() {
                        problematic.push(entry.clone());
                    }
                    instances.push(entry);
                }
                Err(e) => {
                    log::warn!("console log for {} unavailable: {}", server.name, e);
                    instances.push(json!({
                        "id": server.id,
                        "name": server.name,
                        "status": server.status,
                        "analysis_error": e.to_string(),
                    }));
                }
            }
        }

        let analysis = if problematic.is_empty() {
            "All instances are healthy. No action is required.".to_string()
        } else {
            log::info!("requesting AI analysis for infrastructure-level insights");
            let prompt = infrastructure_prompt(servers.len(), &problematic, status_filter);
            sampling::sample(self.llm.as_ref(), None, &prompt, ANALYSIS_FALLBACK)
                .await
                .map_err(|e| format!("{}: {}", CONTEXT, e))?
        };

        let detail = json!({
            "summary": {
                "total_analyzed": servers.len(),
                "filter_applied": status_filter.unwrap_or("none"),
                "analysis_timestamp": timestamp(),
            },
            "instances": instances,
        });

        Ok(format!(
            "# OpenStack Infrastructure Analysis\n\n\
             ## Summary\n\
             - **Total instances**: {}\n\
             - **Problematic instances**: {}\n\
             - **Healthy instances**: {}\n\n\
             ## AI Infrastructure Analysis\n\n\
             {}\n\n\
             ## Instance Details\n\n\
             {}\n\n\
             ---\n\
             *Analyzed at: {}*\n",
            servers.len(),
            problematic.len(),
            servers.len() - problematic.len(),
            analysis,
            pretty(&detail),
            timestamp()
        ))
    }

    async fn emergency_recovery_plan(&self, server_id: &str) -> ToolOutcome {
        const CONTEXT: &str = "Error creating recovery plan";
        log::info!("creating emergency recovery plan for {}", server_id);

        let server = self.find_server(server_id, CONTEXT).await?;
        let console = self
            .backend
            .console_output(&server, self.limits.recovery_log_lines)
            .await
            .map_err(|e| format!("{}: {}", CONTEXT, e))?;
        let scan = self.extractor.extract(&console);

        let prompt = recovery_prompt(&server, &scan, &console, &self.limits);
        let plan = sampling::sample(self.llm.as_ref(), None, &prompt, RECOVERY_FALLBACK)
            .await
            .map_err(|e| format!("{}: {}", CONTEXT, e))?;

        Ok(format!(
            "# AI Emergency Recovery Plan\n\n\
             ## Instance\n\
             - **Server**: {} ({})\n\
             - **Current status**: {}\n\n\
             ## Recovery Plan\n\n\
             {}\n\n\
             ## Important\n\
             - Consider taking a snapshot before any recovery action\n\
             - Verify the result after each step\n\
             - Escalate immediately if the problem persists\n\n\
             ---\n\
             *Plan generated at: {}*\n",
            server.name,
            server.id,
            server.status,
            plan,
            timestamp()
        ))
    }

    async fn custom_question_analysis(&self, server_id: &str, question: &str) -> ToolOutcome {
        const CONTEXT: &str = "Error processing question";
        log::info!("processing custom question about {}", server_id);

        let server = self.find_server(server_id, CONTEXT).await?;
        let console = self
            .backend
            .console_output(&server, self.limits.question_log_lines)
            .await
            .map_err(|e| format!("{}: {}", CONTEXT, e))?;

        let prompt = question_prompt(&server, question, &console);
        let answer = sampling::sample(self.llm.as_ref(), None, &prompt, ANSWER_FALLBACK)
            .await
            .map_err(|e| format!("{}: {}", CONTEXT, e))?;

        Ok(format!(
            "# Custom Question Analysis\n\n\
             ## Question\n\
             > {}\n\n\
             ## Instance\n\
             - **Server**: {} ({})\n\
             - **Status**: {}\n\n\
             ## AI Answer\n\n\
             {}\n\n\
             ---\n\
             *Analyzed at: {}*\n",
            question,
            server.name,
            server.id,
            server.status,
            answer,
            timestamp()
        ))
    }

    async fn glance_list_images(&self, public_only: bool) -> ToolOutcome {
        let images = self
            .backend
            .list_images(public_only)
            .await
            .map_err(|e| format!("Error listing images: {}", e))?;
        if images.is_empty() {
            return Ok("No images found".to_string());
        }
        let listing: Vec<Value> = images
            .iter()
            .map(|image| {
                json!({
                    "id": image.id,
                    "name": image.name,
                    "status": image.status,
                    "visibility": image.visibility,
                    "size": image.size,
                    "created": image.created_at,
                    "updated": image.updated_at,
                })
            })
            .collect();
        Ok(pretty(&Value::Array(listing)))
    }

    async fn neutron_list_networks(&self, external_only: bool) -> ToolOutcome {
        let networks = self
            .backend
            .list_networks(external_only)
            .await
            .map_err(|e| format!("Error listing networks: {}", e))?;
        if networks.is_empty() {
            return Ok("No networks found".to_string());
        }
        let listing: Vec<Value> = networks
            .iter()
            .map(|network| {
                json!({
                    "id": network.id,
                    "name": network.name,
                    "status": network.status,
                    "admin_state_up": network.admin_state_up,
                    "external": network.router_external,
                    "shared": network.shared,
                    "subnets": network.subnets,
                })
            })
            .collect();
        Ok(pretty(&Value::Array(listing)))
    }

    async fn nova_list_flavors(&self, public_only: bool) -> ToolOutcome {
        let flavors = self
            .backend
            .list_flavors(public_only)
            .await
            .map_err(|e| format!("Error listing flavors: {}", e))?;
        if flavors.is_empty() {
            return Ok("No flavors found".to_string());
        }
        let listing: Vec<Value> = flavors
            .iter()
            .map(|flavor| {
                json!({
                    "id": flavor.id,
                    "name": flavor.name,
                    "vcpus": flavor.vcpus,
                    "ram": flavor.ram,
                    "disk": flavor.disk,
                    "ephemeral": flavor.ephemeral,
                    "swap": flavor.swap,
                    "is_public": flavor.is_public,
                })
            })
            .collect();
        Ok(pretty(&Value::Array(listing)))
    }
}

#[async_trait]
impl ToolProtocol for OpenStackToolProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let p = &parameters;
        let outcome = match tool_name {
            NOVA_LIST => {
                self.nova_list(optional_bool(p, "detailed", false)?, optional_str(p, "status"))
                    .await
            }
            NOVA_SHOW => self.nova_show(required_str(p, "server_id")?).await,
            NOVA_CONSOLE_LOG => {
                let length = optional_usize(p, "length", self.limits.console_log_lines)?;
                self.nova_console_log(required_str(p, "server_id")?, length)
                    .await
            }
            ANALYZE_INSTANCE_ERRORS => {
                let log_lines = optional_usize(p, "log_lines", self.limits.analysis_log_lines)?;
                self.analyze_instance_errors(required_str(p, "server_id")?, log_lines)
                    .await
            }
            BULK_INFRASTRUCTURE_ANALYSIS => {
                let max_instances =
                    optional_usize(p, "max_instances", self.limits.bulk_max_instances)?;
                self.bulk_infrastructure_analysis(optional_str(p, "status_filter"), max_instances)
                    .await
            }
            EMERGENCY_RECOVERY_PLAN => {
                self.emergency_recovery_plan(required_str(p, "server_id")?)
                    .await
            }
            CUSTOM_QUESTION_ANALYSIS => {
                self.custom_question_analysis(
                    required_str(p, "server_id")?,
                    required_str(p, "question")?,
                )
                .await
            }
            GLANCE_LIST_IMAGES => {
                self.glance_list_images(optional_bool(p, "public_only", false)?)
                    .await
            }
            NEUTRON_LIST_NETWORKS => {
                self.neutron_list_networks(optional_bool(p, "external_only", false)?)
                    .await
            }
            NOVA_LIST_FLAVORS => {
                self.nova_list_flavors(optional_bool(p, "public_only", false)?)
                    .await
            }
            other => return Err(Box::new(ToolError::NotFound(other.to_string()))),
        };

        Ok(match outcome {
            Ok(text) => ToolResult::text(text),
            Err(message) => {
                log::warn!("{} failed: {}", tool_name, message);
                ToolResult::failure(message)
            }
        })
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(self.tool_catalog())
    }

    fn protocol_name(&self) -> &str {
        "openstack"
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

/// The last `max_chars` characters of `text`.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let start = text
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[start..]
}

fn json_or_na(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) if s.is_empty() => "N/A".to_string(),
        other => pretty(other),
    }
}

/// Prompt asking the LLM to diagnose one instance from its scan result and log tail.
///
/// Only the first `limits.prompt_record_limit` records are quoted, independently of how many
/// the extractor retained.
pub fn instance_analysis_prompt(
    server: &Server,
    scan: &ScanResult,
    console: &str,
    limits: &AnalysisLimits,
) -> String {
    let mut prompt = format!(
        "You are an OpenStack expert. Analyze the console log of the following instance and \
         provide an error diagnosis and solutions.\n\n\
         **Instance:**\n\
         - ID: {}\n\
         - Name: {}\n\
         - Status: {}\n\
         - Created: {}\n\
         - Flavor: {}\n\
         - Image: {}\n\n\
         **Error scan:**\n\
         - Error lines: {}\n\
         - Total log lines: {}\n\n\
         **Main error lines:**\n",
        server.id,
        server.name,
        server.status,
        server.created.as_deref().unwrap_or("N/A"),
        json_or_na(&server.flavor),
        json_or_na(&server.image),
        scan.error_count,
        scan.total_lines,
    );

    for (i, record) in scan
        .error_lines
        .iter()
        .take(limits.prompt_record_limit)
        .enumerate()
    {
        prompt.push_str(&format!(
            "\nError {} (Line {}):\n  Content: {}\n",
            i + 1,
            record.line_number,
            record.content
        ));
        let before = &record.context_before;
        let before = &before[before.len().saturating_sub(PROMPT_CONTEXT_LINES)..];
        let after = &record.context_after;
        let after = &after[..after.len().min(PROMPT_CONTEXT_LINES)];
        if !before.is_empty() {
            prompt.push_str(&format!("  Before: {}\n", before.join(" | ")));
        }
        if !after.is_empty() {
            prompt.push_str(&format!("  After: {}\n", after.join(" | ")));
        }
    }

    prompt.push_str(&format!(
        "\n\n**Log (tail):**\n```\n{}\n```\n\n\
         Structure the analysis as follows:\n\n\
         1. **Diagnosis**: the main problems found\n\
         2. **Root cause**: the most likely causes\n\
         3. **Immediate fix**: OpenStack commands that can be run right away\n\
         4. **Detailed resolution**: a step-by-step guide\n\
         5. **Prevention**: how to avoid a recurrence\n\
         6. **Cautions**: what to watch out for while fixing\n\n\
         Include concrete, runnable OpenStack CLI commands.\n",
        tail_chars(console, limits.analysis_tail_chars)
    ));
    prompt
}

fn infrastructure_prompt(total: usize, problematic: &[Value], status_filter: Option<&str>) -> String {
    format!(
        "These are the results of a bulk analysis of several instances in an OpenStack \
         environment. Identify problems and solutions from an infrastructure-wide perspective.\n\n\
         **Summary:**\n\
         - Instances analyzed: {}\n\
         - Problematic instances: {}\n\
         - Filter: {}\n\n\
         **Problematic instances:**\n{}\n\n\
         Cover the following:\n\n\
         1. **Infrastructure-level issues**: common patterns or system problems\n\
         2. **Priorities**: which instances to handle first\n\
         3. **Automation**: how to automate recurring fixes\n\
         4. **Monitoring**: additional metrics to watch\n\
         5. **Escalation**: what to report to the responsible teams\n\n\
         Include runnable OpenStack commands and scripts.\n",
        total,
        problematic.len(),
        status_filter.unwrap_or("none"),
        pretty(&Value::Array(problematic.to_vec()))
    )
}

fn recovery_prompt(
    server: &Server,
    scan: &ScanResult,
    console: &str,
    limits: &AnalysisLimits,
) -> String {
    let fault = server
        .fault
        .as_ref()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "none".to_string());
    let log = if console.is_empty() {
        "no log"
    } else {
        tail_chars(console, limits.recovery_tail_chars)
    };
    format!(
        "A serious problem occurred on an OpenStack instance. Write an emergency recovery \
         procedure.\n\n\
         **Instance:**\n\
         - ID: {}\n\
         - Name: {}\n\
         - Status: {}\n\
         - Power State: {}\n\
         - VM State: {}\n\
         - Task State: {}\n\
         - Fault: {}\n\n\
         **Error scan:**\n\
         - Errors found: {}\n\
         - Error count: {}\n\n\
         **Recent log (tail):**\n```\n{}\n```\n\n\
         Structure the recovery plan as follows:\n\n\
         1. **Immediate actions** (within 5 minutes)\n\
         2. **Short-term recovery** (within 30 minutes)\n\
         3. **Long-term fix** (within 1 hour)\n\
         4. **Checklist** for each step\n\
         5. **Escalation criteria**\n\
         6. **Contacts** (teams to involve)\n\n\
         Write every command for the OpenStack CLI.\n",
        server.id,
        server.name,
        server.status,
        server.power_state_name(),
        server.vm_state.as_deref().unwrap_or("N/A"),
        server.task_state.as_deref().unwrap_or("N/A"),
        fault,
        if scan.has_errors { "yes" } else { "no" },
        scan.error_count,
        log
    )
}

fn question_prompt(server: &Server, question: &str, console: &str) -> String {
    format!(
        "As an OpenStack expert, answer the user's question about the following instance.\n\n\
         **Instance:**\n\
         - ID: {}\n\
         - Name: {}\n\
         - Status: {}\n\
         - Flavor: {}\n\n\
         **Question:**\n{}\n\n\
         **Console log:**\n```\n{}\n```\n\n\
         Give a detailed and practical answer based on this information. Include concrete \
         OpenStack commands or fixes where possible.\n",
        server.id,
        server.name,
        server.status,
        json_or_na(&server.flavor),
        question,
        if console.is_empty() { "no log" } else { console }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openstack_mcp::log_analysis::extract_error_patterns;

    #[test]
    fn test_tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("abc", 5), "abc");
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn test_prompt_excerpt_is_limited_independently() {
        let log: String = (0..20).map(|i| format!("error {}\n", i)).collect();
        let scan = extract_error_patterns(&log);
        assert_eq!(scan.error_lines.len(), 15);

        let server = Server {
            id: "s1".into(),
            name: "web".into(),
            status: "ERROR".into(),
            ..Default::default()
        };
        let prompt = instance_analysis_prompt(&server, &scan, &log, &AnalysisLimits::default());

        assert!(prompt.contains("Error 10 (Line 10)"));
        assert!(!prompt.contains("Error 11 (Line 11)"));
        assert!(prompt.contains("- Error lines: 20"));
        assert!(prompt.contains("Before: error 7 | error 8"));
        assert!(prompt.contains("- Flavor: N/A"));
    }

    #[test]
    fn test_prompt_quotes_two_context_lines_per_side() {
        let log = "b1\nb2\nb3\nb4\nkernel panic\na1\na2\na3\na4";
        let scan = ErrorPatternExtractor::default()
            .with_context_lines(4)
            .extract(log);
        assert_eq!(scan.error_lines[0].context_before.len(), 4);

        let server = Server {
            id: "s1".into(),
            name: "web".into(),
            status: "ERROR".into(),
            ..Default::default()
        };
        let prompt = instance_analysis_prompt(&server, &scan, log, &AnalysisLimits::default());

        assert!(prompt.contains("  Before: b3 | b4\n"));
        assert!(prompt.contains("  After: a1 | a2\n"));
    }
}
