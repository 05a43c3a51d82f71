//! HTTP Server Adapter for MCP
//!
//! This module defines a pluggable interface for HTTP servers that expose a
//! [`UnifiedMcpServer`]. The builder only talks to [`HttpServerAdapter`]; the axum
//! implementation is available with the `mcp-server` feature.
//!
//! # Endpoints
//!
//! ```text
//! POST /tools/list       {"tools": [ToolMetadata]}
//! POST /tools/execute    {"tool": "...", "parameters": {...}} -> {"result": ToolResult}
//! POST /resources/list   {"resources": [ResourceMetadata]}
//! POST /resources/read   {"uri": "..."} -> {"uri": "...", "content": "..."}
//! POST /mcp              JSON-RPC 2.0 (see jsonrpc module)
//! ```
//!
//! Every route applies the [`AccessPolicy`]: a client outside the IP allow-list gets `403`,
//! missing or wrong credentials get `401`.

use crate::openstack_mcp::jsonrpc::McpDispatcher;
use crate::openstack_mcp::mcp_server_builder_utils::AccessPolicy;
use std::error::Error;
use std::net::SocketAddr;

/// Configuration for an HTTP MCP server
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Socket address to bind to (port 0 picks a free port)
    pub addr: SocketAddr,
    /// IP filtering and authentication applied to every request
    pub access: AccessPolicy,
}

/// A running HTTP server instance
///
/// Dropping the instance stops the server gracefully.
pub struct HttpServerInstance {
    addr: SocketAddr,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl HttpServerInstance {
    pub fn new(
        addr: SocketAddr,
        shutdown: tokio::sync::oneshot::Sender<()>,
        task: tokio::task::JoinHandle<std::io::Result<()>>,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task,
        }
    }

    /// Address the server is listening on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run until the server stops on its own (normally never).
    pub async fn wait(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let Self { task, shutdown, .. } = self;
        let result = task.await;
        drop(shutdown);
        Ok(result??)
    }

    /// Ask the server to stop accepting connections and wait for it to finish.
    pub async fn shutdown(mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        Ok(self.task.await??)
    }
}

/// Trait for HTTP server implementations
#[async_trait::async_trait]
pub trait HttpServerAdapter: Send + Sync {
    /// Bind `config.addr` and serve `dispatcher`'s server until shut down.
    async fn start(
        &self,
        config: HttpServerConfig,
        dispatcher: McpDispatcher,
    ) -> Result<HttpServerInstance, Box<dyn Error + Send + Sync>>;

    /// Name of this adapter (for logging)
    fn name(&self) -> &str {
        "unknown"
    }
}

#[cfg(feature = "mcp-server")]
pub use axum_adapter::{router, AxumHttpAdapter};

#[cfg(feature = "mcp-server")]
mod axum_adapter {
    use super::{HttpServerAdapter, HttpServerConfig, HttpServerInstance};
    use crate::openstack_mcp::event::McpEvent;
    use crate::openstack_mcp::jsonrpc::McpDispatcher;
    use crate::openstack_mcp::mcp_server_builder_utils::{AccessDenied, AccessPolicy};
    use crate::openstack_mcp::tool_protocol::ToolProtocol;
    use axum::extract::{ConnectInfo, State};
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::error::Error;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[derive(Clone)]
    struct AppState {
        dispatcher: McpDispatcher,
        access: Arc<AccessPolicy>,
    }

    impl AppState {
        async fn guard(&self, client: SocketAddr, headers: &HeaderMap) -> Result<(), Response> {
            let authorization = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            match self.access.check(client.ip(), authorization) {
                Ok(()) => Ok(()),
                Err(denied) => {
                    self.dispatcher
                        .server()
                        .emit(McpEvent::RequestRejected {
                            client: Some(client.ip().to_string()),
                            reason: denied.to_string(),
                        })
                        .await;
                    let status = match denied {
                        AccessDenied::Forbidden => StatusCode::FORBIDDEN,
                        AccessDenied::Unauthorized => StatusCode::UNAUTHORIZED,
                    };
                    let message = match denied {
                        AccessDenied::Forbidden => "Access denied",
                        AccessDenied::Unauthorized => "Unauthorized",
                    };
                    Err((status, Json(json!({ "error": message }))).into_response())
                }
            }
        }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> Response {
        (status, Json(json!({ "error": message.into() }))).into_response()
    }

    async fn tools_list(
        State(state): State<AppState>,
        ConnectInfo(client): ConnectInfo<SocketAddr>,
        headers: HeaderMap,
    ) -> Response {
        if let Err(rejection) = state.guard(client, &headers).await {
            return rejection;
        }
        match state.dispatcher.server().list_tools().await {
            Ok(tools) => Json(json!({ "tools": tools })).into_response(),
            Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    async fn tools_execute(
        State(state): State<AppState>,
        ConnectInfo(client): ConnectInfo<SocketAddr>,
        headers: HeaderMap,
        Json(payload): Json<Value>,
    ) -> Response {
        if let Err(rejection) = state.guard(client, &headers).await {
            return rejection;
        }
        let Some(tool_name) = payload.get("tool").and_then(Value::as_str) else {
            return error(StatusCode::BAD_REQUEST, "Missing 'tool'");
        };
        let parameters = payload
            .get("parameters")
            .cloned()
            .filter(|p| !p.is_null())
            .unwrap_or_else(|| json!({}));

        match state.dispatcher.server().execute(tool_name, parameters).await {
            Ok(result) => Json(json!({ "result": result })).into_response(),
            Err(e) => error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }

    async fn resources_list(
        State(state): State<AppState>,
        ConnectInfo(client): ConnectInfo<SocketAddr>,
        headers: HeaderMap,
    ) -> Response {
        if let Err(rejection) = state.guard(client, &headers).await {
            return rejection;
        }
        let server = state.dispatcher.server();
        if !server.has_resources().await {
            return error(StatusCode::NOT_IMPLEMENTED, "Resources not supported");
        }
        match server.list_resources().await {
            Ok(resources) => Json(json!({ "resources": resources })).into_response(),
            Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    async fn resources_read(
        State(state): State<AppState>,
        ConnectInfo(client): ConnectInfo<SocketAddr>,
        headers: HeaderMap,
        Json(payload): Json<Value>,
    ) -> Response {
        if let Err(rejection) = state.guard(client, &headers).await {
            return rejection;
        }
        let server = state.dispatcher.server();
        if !server.has_resources().await {
            return error(StatusCode::NOT_IMPLEMENTED, "Resources not supported");
        }
        let Some(uri) = payload.get("uri").and_then(Value::as_str) else {
            return error(StatusCode::BAD_REQUEST, "Missing 'uri'");
        };
        match server.read_resource(uri).await {
            Ok(content) => Json(json!({ "uri": uri, "content": content })).into_response(),
            Err(e) => error(StatusCode::NOT_FOUND, e.to_string()),
        }
    }

    async fn mcp(
        State(state): State<AppState>,
        ConnectInfo(client): ConnectInfo<SocketAddr>,
        headers: HeaderMap,
        body: String,
    ) -> Response {
        if let Err(rejection) = state.guard(client, &headers).await {
            return rejection;
        }
        match state.dispatcher.handle_text(&body).await {
            Some(reply) => Json(reply).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        }
    }

    /// Build the MCP router. The caller provides `ConnectInfo<SocketAddr>`, either through
    /// `into_make_service_with_connect_info` or `MockConnectInfo` in tests.
    pub fn router(dispatcher: McpDispatcher, access: AccessPolicy) -> Router {
        let state = AppState {
            dispatcher,
            access: Arc::new(access),
        };
        Router::new()
            .route("/tools/list", post(tools_list))
            .route("/tools/execute", post(tools_execute))
            .route("/resources/list", post(resources_list))
            .route("/resources/read", post(resources_read))
            .route("/mcp", post(mcp))
            .with_state(state)
    }

    /// Default Axum-based HTTP server adapter
    pub struct AxumHttpAdapter;

    #[async_trait::async_trait]
    impl HttpServerAdapter for AxumHttpAdapter {
        async fn start(
            &self,
            config: HttpServerConfig,
            dispatcher: McpDispatcher,
        ) -> Result<HttpServerInstance, Box<dyn Error + Send + Sync>> {
            let server = dispatcher.server().clone();
            let app = router(dispatcher, config.access)
                .into_make_service_with_connect_info::<SocketAddr>();

            let listener = TcpListener::bind(config.addr).await?;
            let addr = listener.local_addr()?;

            server
                .emit(McpEvent::ServerStarted {
                    transport: "http".to_string(),
                    addr: Some(addr.to_string()),
                })
                .await;

            let (tx, rx) = tokio::sync::oneshot::channel::<()>();
            let task = tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = rx.await;
                    })
                    .await
            });

            Ok(HttpServerInstance::new(addr, tx, task))
        }

        fn name(&self) -> &str {
            "axum"
        }
    }
}
