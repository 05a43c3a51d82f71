//! JSON-RPC 2.0 front end speaking the MCP methods.
//!
//! [`McpDispatcher`] turns JSON-RPC requests into calls on a [`UnifiedMcpServer`]. It is served
//! as newline-delimited JSON over stdio, or over HTTP through the `/mcp` route.
//!
//! # Example
//!
//! ```rust
//! use openstack_mcp::jsonrpc::McpDispatcher;
//! use openstack_mcp::mcp_server::UnifiedMcpServer;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let dispatcher = McpDispatcher::new(UnifiedMcpServer::new(), "demo", "0.1.0");
//! let reply = dispatcher
//!     .handle(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
//!     .await
//!     .unwrap();
//! assert_eq!(reply["result"], json!({}));
//!
//! // Notifications get no reply.
//! assert!(dispatcher
//!     .handle(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
//!     .await
//!     .is_none());
//! # }
//! ```

use crate::openstack_mcp::event::McpEvent;
use crate::openstack_mcp::mcp_server::UnifiedMcpServer;
use crate::openstack_mcp::tool_protocol::ToolProtocol;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// MCP protocol revision announced in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Routes MCP JSON-RPC methods to a [`UnifiedMcpServer`].
#[derive(Clone)]
pub struct McpDispatcher {
    server: UnifiedMcpServer,
    name: String,
    version: String,
    instructions: Option<String>,
}

impl McpDispatcher {
    pub fn new(server: UnifiedMcpServer, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            server,
            name: name.into(),
            version: version.into(),
            instructions: None,
        }
    }

    /// Free-form usage hints returned from `initialize`.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn server(&self) -> &UnifiedMcpServer {
        &self.server
    }

    /// Handle one raw JSON-RPC message. Returns `None` when no reply is due.
    pub async fn handle_text(&self, text: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => Some(error_response(
                Value::Null,
                PARSE_ERROR,
                &format!("Parse error: {}", e),
            )),
        }
    }

    /// Handle a parsed message or batch. Returns `None` for notifications and for batches made
    /// only of notifications.
    pub async fn handle(&self, message: Value) -> Option<Value> {
        match message {
            Value::Array(batch) => {
                if batch.is_empty() {
                    return Some(error_response(Value::Null, INVALID_REQUEST, "Empty batch"));
                }
                let mut replies = Vec::new();
                for item in batch {
                    if let Some(reply) = self.handle_single(item).await {
                        replies.push(reply);
                    }
                }
                (!replies.is_empty()).then_some(Value::Array(replies))
            }
            single => self.handle_single(single).await,
        }
    }

    async fn handle_single(&self, message: Value) -> Option<Value> {
        let id = message.get("id").cloned();
        let method = message.get("method").and_then(Value::as_str);

        let (method, id) = match (message.get("jsonrpc").and_then(Value::as_str), method, id) {
            (Some("2.0"), Some(method), id) => (method, id),
            (_, _, id) => {
                return Some(error_response(
                    id.unwrap_or(Value::Null),
                    INVALID_REQUEST,
                    "Invalid Request",
                ))
            }
        };

        let params = message.get("params").cloned().unwrap_or_else(|| json!({}));

        let Some(id) = id else {
            log::debug!("notification: {}", method);
            return None;
        };

        log::debug!("request {}: {}", id, method);
        let outcome = match method {
            "initialize" => Ok(self.initialize().await),
            "ping" => Ok(json!({})),
            "tools/list" => self.tools_list().await,
            "tools/call" => self.tools_call(&params).await,
            "resources/list" => self.resources_list().await,
            "resources/read" => self.resources_read(&params).await,
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        Some(match outcome {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err((code, message)) => error_response(id, code, &message),
        })
    }

    async fn initialize(&self) -> Value {
        let mut capabilities = json!({"tools": {"listChanged": false}});
        if self.server.has_resources().await {
            capabilities["resources"] = json!({"subscribe": false, "listChanged": false});
        }
        let mut result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": capabilities,
            "serverInfo": {"name": self.name, "version": self.version},
        });
        if let Some(instructions) = &self.instructions {
            result["instructions"] = Value::String(instructions.clone());
        }
        result
    }

    async fn tools_list(&self) -> Result<Value, (i64, String)> {
        let tools = self
            .server
            .list_tools()
            .await
            .map_err(|e| (INTERNAL_ERROR, e.to_string()))?;
        let tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema(),
                })
            })
            .collect();
        Ok(json!({ "tools": tools }))
    }

    async fn tools_call(&self, params: &Value) -> Result<Value, (i64, String)> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| (INVALID_PARAMS, "Missing tool name".to_string()))?;
        if !self.server.has_tool(name).await {
            return Err((INVALID_PARAMS, format!("Unknown tool: {}", name)));
        }
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args @ Value::Object(_)) => args.clone(),
            Some(_) => {
                return Err((INVALID_PARAMS, "Tool arguments must be an object".to_string()))
            }
        };

        let (text, is_error) = match self.server.execute(name, arguments).await {
            Ok(result) => (result.display_text(), !result.success),
            Err(e) => (e.to_string(), true),
        };
        Ok(json!({
            "content": [{"type": "text", "text": text}],
            "isError": is_error,
        }))
    }

    async fn resources_list(&self) -> Result<Value, (i64, String)> {
        let resources = self
            .server
            .list_resources()
            .await
            .map_err(|e| (INTERNAL_ERROR, e.to_string()))?;
        let resources: Vec<Value> = resources.iter().map(|r| r.to_mcp_json()).collect();
        Ok(json!({ "resources": resources }))
    }

    async fn resources_read(&self, params: &Value) -> Result<Value, (i64, String)> {
        let uri = params
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| (INVALID_PARAMS, "Missing resource uri".to_string()))?;

        let text = self
            .server
            .read_resource(uri)
            .await
            .map_err(|e| (INVALID_PARAMS, e.to_string()))?;
        let mime_type = self
            .server
            .list_resources()
            .await
            .unwrap_or_default()
            .into_iter()
            .find(|r| r.uri == uri)
            .and_then(|r| r.mime_type);

        let mut content = json!({"uri": uri, "text": text});
        if let Some(mime) = mime_type {
            content["mimeType"] = Value::String(mime);
        }
        Ok(json!({ "contents": [content] }))
    }

    /// Serve newline-delimited JSON-RPC until `reader` reaches end of input.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(reply) = self.handle_text(&line).await {
                let mut out = reply.to_string();
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Serve over the process's stdin and stdout.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        self.server
            .emit(McpEvent::ServerStarted {
                transport: "stdio".to_string(),
                addr: None,
            })
            .await;
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await
    }
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
}
