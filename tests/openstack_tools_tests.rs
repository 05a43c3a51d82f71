//! OpenStack tool set driven by an in-memory cloud and a scripted LLM.

use async_trait::async_trait;
use openstack_mcp::client_wrapper::{ClientWrapper, Message, Role};
use openstack_mcp::config::AnalysisLimits;
use openstack_mcp::openstack::{
    CloudError, ComputeBackend, Flavor, Image, Network, Server, ServerQuery,
};
use openstack_mcp::tool_protocol::{ToolError, ToolProtocol};
use openstack_mcp::tools::OpenStackToolProtocol;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeCloud {
    servers: Vec<Server>,
    /// Console text per server ID; a missing entry makes the console call fail.
    consoles: HashMap<String, String>,
    images: Vec<Image>,
    networks: Vec<Network>,
    flavors: Vec<Flavor>,
    list_error: Option<CloudError>,
    console_calls: Mutex<Vec<(String, usize)>>,
}

impl FakeCloud {
    fn with_server(mut self, server: Server, console: Option<&str>) -> Self {
        if let Some(console) = console {
            self.consoles.insert(server.id.clone(), console.to_string());
        }
        self.servers.push(server);
        self
    }
}

#[async_trait]
impl ComputeBackend for FakeCloud {
    async fn list_servers(&self, query: &ServerQuery) -> Result<Vec<Server>, CloudError> {
        if let Some(err) = &self.list_error {
            return Err(err.clone());
        }
        Ok(self
            .servers
            .iter()
            .filter(|s| query.status.as_deref().map_or(true, |st| s.status == st))
            .cloned()
            .collect())
    }

    async fn get_server(&self, name_or_id: &str) -> Result<Option<Server>, CloudError> {
        Ok(self
            .servers
            .iter()
            .find(|s| s.id == name_or_id || s.name == name_or_id)
            .cloned())
    }

    async fn console_output(&self, server: &Server, length: usize) -> Result<String, CloudError> {
        self.console_calls
            .lock()
            .unwrap()
            .push((server.id.clone(), length));
        self.consoles
            .get(&server.id)
            .cloned()
            .ok_or_else(|| CloudError::Api {
                status: 409,
                message: "console unavailable".into(),
            })
    }

    async fn list_images(&self, public_only: bool) -> Result<Vec<Image>, CloudError> {
        Ok(self
            .images
            .iter()
            .filter(|i| !public_only || i.visibility.as_deref() == Some("public"))
            .cloned()
            .collect())
    }

    async fn list_networks(&self, external_only: bool) -> Result<Vec<Network>, CloudError> {
        Ok(self
            .networks
            .iter()
            .filter(|n| !external_only || n.router_external)
            .cloned()
            .collect())
    }

    async fn list_flavors(&self, public_only: bool) -> Result<Vec<Flavor>, CloudError> {
        Ok(self
            .flavors
            .iter()
            .filter(|f| !public_only || f.is_public)
            .cloned()
            .collect())
    }
}

struct ScriptedLlm {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientWrapper for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn send_message(
        &self,
        messages: &[Message],
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        if let Some(last) = messages.last() {
            self.prompts.lock().unwrap().push(last.content.clone());
        }
        match &self.reply {
            Ok(text) => Ok(Message {
                role: Role::Assistant,
                content: text.clone(),
            }),
            Err(message) => Err(message.clone().into()),
        }
    }
}

fn server(id: &str, name: &str, status: &str) -> Server {
    Server {
        id: id.to_string(),
        name: name.to_string(),
        status: status.to_string(),
        flavor: json!({"original_name": "m1.small"}),
        image: json!({"id": "img-1"}),
        created: Some("2024-01-01T00:00:00Z".to_string()),
        power_state: Some(1),
        vm_state: Some("active".to_string()),
        ..Default::default()
    }
}

const BROKEN_CONSOLE: &str = "Booting\nEXT4-fs error: bad block\nRemounting read-only\nlogin:";
const CLEAN_CONSOLE: &str = "Booting\nStarting sshd\nlogin:";

fn tools(cloud: FakeCloud, llm: Arc<ScriptedLlm>) -> OpenStackToolProtocol {
    OpenStackToolProtocol::new(Arc::new(cloud), llm)
}

async fn run(tools: &OpenStackToolProtocol, name: &str, params: Value) -> (bool, String) {
    let result = tools.execute(name, params).await.unwrap();
    (result.success, result.display_text())
}

#[tokio::test]
async fn test_lists_all_ten_tools() {
    let tools = tools(FakeCloud::default(), ScriptedLlm::replying("x"));
    let names: Vec<String> = tools
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();

    assert_eq!(names.len(), 10);
    for expected in [
        "nova_list",
        "nova_show",
        "nova_console_log",
        "analyze_instance_errors",
        "bulk_infrastructure_analysis",
        "emergency_recovery_plan",
        "custom_question_analysis",
        "glance_list_images",
        "neutron_list_networks",
        "nova_list_flavors",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {}", expected);
    }

    let analyze = tools.get_tool_metadata("analyze_instance_errors").await.unwrap();
    assert_eq!(analyze.input_schema()["required"], json!(["server_id"]));
}

#[tokio::test]
async fn test_nova_list_filters_and_details() {
    let cloud = FakeCloud::default()
        .with_server(server("s1", "web", "ACTIVE"), None)
        .with_server(server("s2", "db", "ERROR"), None);
    let tools = tools(cloud, ScriptedLlm::replying("x"));

    let (ok, text) = run(&tools, "nova_list", json!({})).await;
    assert!(ok);
    let listing: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 2);
    assert_eq!(listing[0], json!({"id": "s1", "name": "web", "status": "ACTIVE"}));

    let (_, text) = run(&tools, "nova_list", json!({"status": "error", "detailed": true})).await;
    let listing: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert_eq!(listing[0]["name"], "db");
    assert_eq!(listing[0]["flavor"], "m1.small");
    assert_eq!(listing[0]["power_state"], "RUNNING");
    assert_eq!(listing[0]["vm_state"], "active");

    let (ok, text) = run(&tools, "nova_list", json!({"status": "SHUTOFF"})).await;
    assert!(ok);
    assert_eq!(text, "No servers found");
}

#[tokio::test]
async fn test_cloud_failures_become_tool_errors() {
    let cloud = FakeCloud {
        list_error: Some(CloudError::Http("connection reset".into())),
        ..Default::default()
    };
    let tools = tools(cloud, ScriptedLlm::replying("x"));

    let (ok, text) = run(&tools, "nova_list", json!({})).await;
    assert!(!ok);
    assert!(text.starts_with("Error listing servers: "));
    assert!(text.contains("connection reset"));

    let (ok, text) = run(&tools, "bulk_infrastructure_analysis", json!({})).await;
    assert!(!ok);
    assert!(text.starts_with("Error in bulk analysis: "));
}

#[tokio::test]
async fn test_nova_show_and_missing_server() {
    let web = Server {
        key_name: Some("ops-key".to_string()),
        security_groups: Some(json!([{"name": "default"}])),
        availability_zone: Some("nova".to_string()),
        ..server("s1", "web", "ACTIVE")
    };
    let cloud = FakeCloud::default().with_server(web, None);
    let tools = tools(cloud, ScriptedLlm::replying("x"));

    let (ok, text) = run(&tools, "nova_show", json!({"server_id": "web"})).await;
    assert!(ok);
    let detail: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(detail["id"], "s1");
    assert_eq!(detail["task_state"], "N/A");
    assert_eq!(detail["key_name"], "ops-key");
    assert_eq!(detail["security_groups"][0]["name"], "default");
    assert_eq!(detail["availability_zone"], "nova");

    let (ok, text) = run(&tools, "nova_show", json!({"server_id": "nope"})).await;
    assert!(!ok);
    assert_eq!(text, "Server not found: nope");
}

#[tokio::test]
async fn test_missing_required_parameter_is_rejected() {
    let tools = tools(FakeCloud::default(), ScriptedLlm::replying("x"));
    let err = tools.execute("nova_show", json!({})).await.unwrap_err();
    let err = err.downcast_ref::<ToolError>().unwrap();
    assert!(matches!(err, ToolError::InvalidParameters(_)));

    let err = tools.execute("nova_reboot", json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "Tool not found: nova_reboot");
}

#[tokio::test]
async fn test_console_log_header_and_length() {
    let cloud = FakeCloud::default()
        .with_server(server("s1", "web", "ACTIVE"), Some(CLEAN_CONSOLE))
        .with_server(server("s2", "blank", "ACTIVE"), Some(""));
    let cloud = Arc::new(cloud);
    let tools = OpenStackToolProtocol::new(cloud.clone(), ScriptedLlm::replying("x"));

    let (ok, text) = run(&tools, "nova_console_log", json!({"server_id": "s1", "length": 20})).await;
    assert!(ok);
    assert!(text.starts_with("Console log for web (last 20 lines):\n\n"));
    assert!(text.ends_with(CLEAN_CONSOLE));

    let (ok, text) = run(&tools, "nova_console_log", json!({"server_id": "s2"})).await;
    assert!(!ok);
    assert_eq!(text, "No console log available for blank");

    let calls = cloud.console_calls.lock().unwrap().clone();
    assert_eq!(calls, vec![("s1".to_string(), 20), ("s2".to_string(), 50)]);
}

#[tokio::test]
async fn test_healthy_instance_skips_llm() {
    let cloud = FakeCloud::default().with_server(server("s1", "web", "ACTIVE"), Some(CLEAN_CONSOLE));
    let llm = ScriptedLlm::replying("unused");
    let tools = tools(cloud, llm.clone());

    let (ok, text) = run(&tools, "analyze_instance_errors", json!({"server_id": "s1"})).await;
    assert!(ok);
    assert_eq!(
        text,
        "No obvious errors found in web console log. Instance appears healthy."
    );
    assert!(llm.prompts().is_empty());
}

#[tokio::test]
async fn test_analyze_instance_errors_report() {
    let cloud = FakeCloud::default().with_server(server("s1", "web", "ACTIVE"), Some(BROKEN_CONSOLE));
    let llm = ScriptedLlm::replying("Run fsck on the root volume.");
    let tools = tools(cloud, llm.clone());

    let (ok, text) = run(&tools, "analyze_instance_errors", json!({"server_id": "s1"})).await;
    assert!(ok);
    assert!(text.starts_with("# AI OpenStack Instance Error Analysis"));
    assert!(text.contains("- **Errors found**: 1"));
    assert!(text.contains("Run fsck on the root volume."));

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Error 1 (Line 2):"));
    assert!(prompts[0].contains("Content: EXT4-fs error: bad block"));
    assert!(prompts[0].contains("Before: Booting"));
    assert!(prompts[0].contains("After: Remounting read-only | login:"));
    assert!(prompts[0].contains("- Flavor:"));
}

#[tokio::test]
async fn test_analysis_without_console() {
    let cloud = FakeCloud::default().with_server(server("s1", "web", "ACTIVE"), Some(""));
    let tools = tools(cloud, ScriptedLlm::replying("x"));

    let (ok, text) = run(&tools, "analyze_instance_errors", json!({"server_id": "s1"})).await;
    assert!(!ok);
    assert_eq!(text, "No console log available for server: web");
}

#[tokio::test]
async fn test_llm_failure_is_reported() {
    let cloud = FakeCloud::default().with_server(server("s1", "web", "ACTIVE"), Some(BROKEN_CONSOLE));
    let tools = tools(cloud, ScriptedLlm::failing("quota exceeded"));

    let (ok, text) = run(&tools, "analyze_instance_errors", json!({"server_id": "s1"})).await;
    assert!(!ok);
    assert_eq!(text, "Error analyzing server s1: quota exceeded");
}

#[tokio::test]
async fn test_bulk_analysis_with_problems() {
    let cloud = FakeCloud::default()
        .with_server(server("s1", "web", "ACTIVE"), Some(BROKEN_CONSOLE))
        .with_server(server("s2", "db", "ACTIVE"), Some(CLEAN_CONSOLE))
        .with_server(server("s3", "cache", "ERROR"), None);
    let llm = ScriptedLlm::replying("Storage backend is degraded.");
    let tools = tools(cloud, llm.clone());

    let (ok, text) = run(&tools, "bulk_infrastructure_analysis", json!({})).await;
    assert!(ok);
    assert!(text.contains("- **Total instances**: 3"));
    // s3 fails its console fetch, so only s1 is flagged.
    assert!(text.contains("- **Problematic instances**: 1"));
    assert!(text.contains("- **Healthy instances**: 2"));
    assert!(text.contains("Storage backend is degraded."));
    assert!(text.contains("\"analysis_error\""));
    assert!(text.contains("\"filter_applied\": \"none\""));
    assert!(text.contains("EXT4-fs error: bad block"));

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("- Instances analyzed: 3"));
    assert!(prompts[0].contains("- Problematic instances: 1"));
}

#[tokio::test]
async fn test_bulk_analysis_error_status_counts_as_problematic() {
    let cloud = FakeCloud::default()
        .with_server(server("s1", "web", "ERROR"), Some(CLEAN_CONSOLE))
        .with_server(server("s2", "db", "ACTIVE"), Some(CLEAN_CONSOLE));
    let tools = tools(cloud, ScriptedLlm::replying("Reschedule web."));

    let (ok, text) = run(&tools, "bulk_infrastructure_analysis", json!({})).await;
    assert!(ok);
    assert!(text.contains("- **Problematic instances**: 1"));
}

#[tokio::test]
async fn test_bulk_analysis_all_healthy_and_limits() {
    let cloud = FakeCloud::default()
        .with_server(server("s1", "web", "ACTIVE"), Some(CLEAN_CONSOLE))
        .with_server(server("s2", "db", "ACTIVE"), Some(CLEAN_CONSOLE));
    let cloud = Arc::new(cloud);
    let llm = ScriptedLlm::replying("unused");
    let tools = OpenStackToolProtocol::new(cloud.clone(), llm.clone());

    let (ok, text) = run(
        &tools,
        "bulk_infrastructure_analysis",
        json!({"max_instances": 1, "status_filter": "active"}),
    )
    .await;
    assert!(ok);
    assert!(text.contains("- **Total instances**: 1"));
    assert!(text.contains("All instances are healthy. No action is required."));
    assert!(text.contains("\"filter_applied\": \"active\""));
    assert!(llm.prompts().is_empty());
    assert_eq!(
        cloud.console_calls.lock().unwrap().clone(),
        vec![("s1".to_string(), 100)]
    );

    let (ok, text) = run(
        &tools,
        "bulk_infrastructure_analysis",
        json!({"status_filter": "SHUTOFF"}),
    )
    .await;
    assert!(!ok);
    assert_eq!(text, "No servers found for analysis");
}

#[tokio::test]
async fn test_emergency_recovery_plan() {
    let cloud = FakeCloud::default().with_server(server("s1", "web", "ERROR"), Some(CLEAN_CONSOLE));
    let cloud = Arc::new(cloud);
    let llm = ScriptedLlm::replying("1. Hard reboot the server.");
    let tools = OpenStackToolProtocol::new(cloud.clone(), llm.clone());

    let (ok, text) = run(&tools, "emergency_recovery_plan", json!({"server_id": "s1"})).await;
    assert!(ok);
    assert!(text.starts_with("# AI Emergency Recovery Plan"));
    assert!(text.contains("1. Hard reboot the server."));
    assert!(text.contains("Consider taking a snapshot before any recovery action"));

    let prompt = &llm.prompts()[0];
    assert!(prompt.contains("- Fault: none"));
    assert!(prompt.contains("- Errors found: no"));
    assert!(prompt.contains("- Power State: RUNNING"));
    assert_eq!(cloud.console_calls.lock().unwrap()[0].1, 300);
}

#[tokio::test]
async fn test_custom_question_analysis() {
    let cloud = FakeCloud::default().with_server(server("s1", "web", "ACTIVE"), Some(""));
    let llm = ScriptedLlm::replying("It is CPU bound.");
    let tools = tools(cloud, llm.clone());

    let (ok, text) = run(
        &tools,
        "custom_question_analysis",
        json!({"server_id": "s1", "question": "Why is it slow?"}),
    )
    .await;
    assert!(ok);
    assert!(text.contains("> Why is it slow?"));
    assert!(text.contains("It is CPU bound."));

    let prompt = &llm.prompts()[0];
    assert!(prompt.contains("Why is it slow?"));
    assert!(prompt.contains("no log"));

    let err = tools
        .execute("custom_question_analysis", json!({"server_id": "s1"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("'question' is required"));
}

#[tokio::test]
async fn test_custom_limits_change_console_lengths() {
    let cloud = Arc::new(
        FakeCloud::default().with_server(server("s1", "web", "ACTIVE"), Some(CLEAN_CONSOLE)),
    );
    let limits = AnalysisLimits {
        analysis_log_lines: 42,
        ..AnalysisLimits::default()
    };
    let tools =
        OpenStackToolProtocol::with_limits(cloud.clone(), ScriptedLlm::replying("x"), limits);

    run(&tools, "analyze_instance_errors", json!({"server_id": "s1"})).await;
    run(&tools, "analyze_instance_errors", json!({"server_id": "s1", "log_lines": "7"})).await;

    let lengths: Vec<usize> = cloud
        .console_calls
        .lock()
        .unwrap()
        .iter()
        .map(|(_, n)| *n)
        .collect();
    assert_eq!(lengths, vec![42, 7]);
}

#[tokio::test]
async fn test_catalog_listings() {
    let cloud = FakeCloud {
        images: vec![
            Image {
                id: "i1".into(),
                name: Some("ubuntu".into()),
                status: "active".into(),
                visibility: Some("public".into()),
                size: Some(1024),
                ..Default::default()
            },
            Image {
                id: "i2".into(),
                status: "active".into(),
                visibility: Some("private".into()),
                ..Default::default()
            },
        ],
        networks: vec![Network {
            id: "n1".into(),
            name: "ext".into(),
            status: "ACTIVE".into(),
            router_external: true,
            ..Default::default()
        }],
        ..Default::default()
    };
    let tools = tools(cloud, ScriptedLlm::replying("x"));

    let (_, text) = run(&tools, "glance_list_images", json!({"public_only": true})).await;
    let images: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(images.as_array().unwrap().len(), 1);
    assert_eq!(images[0]["name"], "ubuntu");
    assert_eq!(images[0]["size"], 1024);

    let (_, text) = run(&tools, "neutron_list_networks", json!({"external_only": true})).await;
    let networks: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(networks[0]["external"], true);

    let (ok, text) = run(&tools, "nova_list_flavors", json!({})).await;
    assert!(ok);
    assert_eq!(text, "No flavors found");
}
