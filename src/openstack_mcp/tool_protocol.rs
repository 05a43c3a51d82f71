//! Tool Protocol Abstraction Layer
//!
//! Every MCP tool served by this crate is provided by a [`ToolProtocol`] implementation. A
//! protocol may expose several tools; the server routes a call to the protocol that registered
//! the tool name.
//!
//! # Architecture
//!
//! ```text
//! MCP client → UnifiedMcpServer → ToolProtocol (trait) → [OpenStack | SecurityReview | custom]
//! ```
//!
//! # Example
//!
//! ```rust
//! use openstack_mcp::tool_protocol::{ToolMetadata, ToolParameter, ToolParameterType};
//! use serde_json::json;
//!
//! let metadata = ToolMetadata::new("nova_console_log", "Fetch a server's console log")
//!     .with_parameter(
//!         ToolParameter::new("server_name_or_id", ToolParameterType::String)
//!             .with_description("Server name or ID")
//!             .required(),
//!     )
//!     .with_parameter(ToolParameter::new("length", ToolParameterType::Integer).with_default(json!(50)));
//!
//! let schema = metadata.input_schema();
//! assert_eq!(schema["required"], json!(["server_name_or_id"]));
//! assert_eq!(schema["properties"]["length"]["default"], json!(50));
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Represents the result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool execution was successful
    pub success: bool,
    /// The output data from the tool
    pub output: serde_json::Value,
    /// Optional error message if execution failed
    pub error: Option<String>,
    /// Metadata about the execution (timing, counts, etc.)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolResult {
    /// Convenience constructor for successful tool execution.
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Successful execution whose output is a plain text report.
    pub fn text(output: impl Into<String>) -> Self {
        Self::success(serde_json::Value::String(output.into()))
    }

    /// Convenience constructor for failed tool execution.
    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error),
            metadata: HashMap::new(),
        }
    }

    /// Attach metadata to the result.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The text an MCP client should display: the output string, the serialised output, or the
    /// error message for failures.
    pub fn display_text(&self) -> String {
        if !self.success {
            return self.error.clone().unwrap_or_else(|| "Tool failed".to_string());
        }
        match &self.output {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Parameter types supported by tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

/// Definition of a tool parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<serde_json::Value>,
}

impl ToolParameter {
    /// Create a new parameter definition with the given name and type.
    pub fn new(name: impl Into<String>, param_type: ToolParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
            default: None,
        }
    }

    /// Attach a human readable description to the parameter.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Provide a default value used when the caller omits the parameter.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    fn json_schema(&self) -> serde_json::Value {
        let mut schema = serde_json::Map::new();
        schema.insert(
            "type".to_string(),
            serde_json::to_value(&self.param_type).unwrap_or(serde_json::Value::Null),
        );
        if let Some(description) = &self.description {
            schema.insert("description".to_string(), description.clone().into());
        }
        if let Some(default) = &self.default {
            schema.insert("default".to_string(), default.clone());
        }
        serde_json::Value::Object(schema)
    }
}

/// Metadata describing a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolMetadata {
    /// Create metadata with the supplied identifier and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter definition.
    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// JSON Schema object advertised as the tool's `inputSchema` over MCP.
    pub fn input_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Trait for implementing tool execution protocols
#[async_trait]
pub trait ToolProtocol: Send + Sync {
    /// Execute a tool with the given parameters
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>>;

    /// Get metadata about available tools
    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>>;

    /// Get metadata about a specific tool
    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
        self.list_tools()
            .await?
            .into_iter()
            .find(|t| t.name == tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()).into())
    }

    /// Protocol identifier used in logs and events
    fn protocol_name(&self) -> &str;

    /// Initialize/connect to the protocol (optional)
    async fn initialize(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    /// Cleanup/disconnect from the protocol (optional)
    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Error types for tool operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    NotFound(String),
    ExecutionFailed(String),
    InvalidParameters(String),
    ProtocolError(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool not found: {}", name),
            ToolError::ExecutionFailed(msg) => write!(f, "Tool execution failed: {}", msg),
            ToolError::InvalidParameters(msg) => write!(f, "Invalid parameters: {}", msg),
            ToolError::ProtocolError(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl Error for ToolError {}

/// Read a required string parameter.
pub fn required_str<'a>(params: &'a serde_json::Value, name: &str) -> Result<&'a str, ToolError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidParameters(format!("'{}' is required", name)))
}

/// Read an optional string parameter; blank strings count as absent.
pub fn optional_str<'a>(params: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Read an optional non-negative integer parameter, accepting numeric strings.
pub fn optional_usize(
    params: &serde_json::Value,
    name: &str,
    default: usize,
) -> Result<usize, ToolError> {
    match params.get(name) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| ToolError::InvalidParameters(format!("'{}' must be a non-negative integer", name))),
        Some(serde_json::Value::String(s)) => s.trim().parse::<usize>().map_err(|_| {
            ToolError::InvalidParameters(format!("'{}' must be a non-negative integer", name))
        }),
        Some(_) => Err(ToolError::InvalidParameters(format!(
            "'{}' must be a non-negative integer",
            name
        ))),
    }
}

/// Read an optional boolean parameter, accepting `"true"`/`"false"` strings.
pub fn optional_bool(
    params: &serde_json::Value,
    name: &str,
    default: bool,
) -> Result<bool, ToolError> {
    match params.get(name) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(serde_json::Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ToolError::InvalidParameters(format!("'{}' must be a boolean", name))),
        },
        Some(_) => Err(ToolError::InvalidParameters(format!(
            "'{}' must be a boolean",
            name
        ))),
    }
}
