//! HTTP routes of the MCP server, exercised in-process.

#![cfg(feature = "mcp-server")]

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use openstack_mcp::event::{EventHandler, McpEvent};
use openstack_mcp::mcp_http_adapter::router;
use openstack_mcp::mcp_server_builder::MCPServerBuilder;
use openstack_mcp::tool_protocol::{
    required_str, ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolResult,
};
use serde_json::{json, Value};
use std::error::Error;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

struct EchoProtocol;

#[async_trait]
impl ToolProtocol for EchoProtocol {
    async fn execute(
        &self,
        _tool_name: &str,
        parameters: Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        Ok(ToolResult::text(required_str(&parameters, "text")?))
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(vec![ToolMetadata::new("echo", "Echo the input").with_parameter(
            ToolParameter::new("text", ToolParameterType::String).required(),
        )])
    }

    fn protocol_name(&self) -> &str {
        "echo"
    }
}

#[derive(Default)]
struct Rejections(Mutex<Vec<String>>);

#[async_trait]
impl EventHandler for Rejections {
    async fn on_mcp_event(&self, event: &McpEvent) {
        if let McpEvent::RequestRejected { reason, .. } = event {
            self.0.lock().unwrap().push(reason.clone());
        }
    }
}

async fn app(client: [u8; 4], rejections: Arc<Rejections>) -> Router {
    let builder = MCPServerBuilder::new()
        .with_event_handler(rejections)
        .with_tool_protocol(Arc::new(EchoProtocol))
        .await
        .unwrap()
        .allow_cidr("10.0.0.0/8")
        .unwrap()
        .with_bearer_token("s3cret");
    router(builder.build_dispatcher(), builder.access_policy())
        .layer(MockConnectInfo(SocketAddr::from((client, 40000))))
}

fn post(uri: &str, token: Option<&str>, body: String) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    request.body(Body::from(body)).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_disallowed_ip_is_forbidden() {
    let rejections = Arc::new(Rejections::default());
    let response = app([192, 0, 2, 1], rejections.clone())
        .await
        .oneshot(post("/tools/list", Some("s3cret"), "{}".into()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await, json!({"error": "Access denied"}));
    assert_eq!(
        rejections.0.lock().unwrap().clone(),
        vec!["IP not allowed".to_string()]
    );
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let rejections = Arc::new(Rejections::default());
    let app = app([10, 1, 2, 3], rejections.clone()).await;

    let missing = app
        .clone()
        .oneshot(post("/tools/list", None, "{}".into()))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .oneshot(post("/tools/list", Some("guess"), "{}".into()))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(wrong).await, json!({"error": "Unauthorized"}));
    assert_eq!(rejections.0.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_tools_list_and_execute() {
    let app = app([10, 1, 2, 3], Arc::new(Rejections::default())).await;

    let listed = app
        .clone()
        .oneshot(post("/tools/list", Some("s3cret"), "{}".into()))
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let listed = json_body(listed).await;
    assert_eq!(listed["tools"][0]["name"], "echo");

    let executed = app
        .clone()
        .oneshot(post(
            "/tools/execute",
            Some("s3cret"),
            json!({"tool": "echo", "parameters": {"text": "hi"}}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(executed.status(), StatusCode::OK);
    let executed = json_body(executed).await;
    assert_eq!(executed["result"]["success"], true);
    assert_eq!(executed["result"]["output"], "hi");

    let unknown = app
        .oneshot(post(
            "/tools/execute",
            Some("s3cret"),
            json!({"tool": "nope"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resources_not_supported_without_providers() {
    let response = app([10, 1, 2, 3], Arc::new(Rejections::default()))
        .await
        .oneshot(post("/resources/list", Some("s3cret"), "{}".into()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_json_rpc_endpoint() {
    let app = app([10, 1, 2, 3], Arc::new(Rejections::default())).await;

    let reply = app
        .clone()
        .oneshot(post(
            "/mcp",
            Some("s3cret"),
            json!({
                "jsonrpc": "2.0", "id": 7, "method": "tools/call",
                "params": {"name": "echo", "arguments": {"text": "over rpc"}}
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(reply.status(), StatusCode::OK);
    let reply = json_body(reply).await;
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["result"]["content"][0]["text"], "over rpc");
    assert_eq!(reply["result"]["isError"], false);

    let notification = app
        .clone()
        .oneshot(post(
            "/mcp",
            Some("s3cret"),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(notification.status(), StatusCode::ACCEPTED);

    let garbage = app
        .oneshot(post("/mcp", Some("s3cret"), "{oops".into()))
        .await
        .unwrap();
    assert_eq!(json_body(garbage).await["error"]["code"], -32700);
}

#[tokio::test]
async fn test_server_binds_and_shuts_down() {
    let instance = MCPServerBuilder::new()
        .with_tool_protocol(Arc::new(EchoProtocol))
        .await
        .unwrap()
        .start_at("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    assert_ne!(instance.addr().port(), 0);
    instance.shutdown().await.unwrap();
}
