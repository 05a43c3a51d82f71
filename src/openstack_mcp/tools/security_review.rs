//! Development-rule resources and LLM code review.
//!
//! Rule documents are Markdown files kept in a rules directory (`static/` by default). They are
//! published as MCP resources and used as the system prompt of the `analyze_code_secure` tool.
//!
//! ```rust,no_run
//! use openstack_mcp::tools::security_review::{DevelopmentRule, RuleLibrary};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let rules = RuleLibrary::load_dir("static")?;
//! let text = rules.read(DevelopmentRule::Security)?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

use crate::openstack_mcp::client_wrapper::ClientWrapper;
use crate::openstack_mcp::resource_protocol::{ResourceError, ResourceMetadata, ResourceProtocol};
use crate::openstack_mcp::sampling;
use crate::openstack_mcp::tool_protocol::{
    required_str, ToolError, ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol,
    ToolResult,
};
use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ANALYZE_CODE_SECURE: &str = "analyze_code_secure";

/// Rule documents known to the development server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevelopmentRule {
    Security,
}

impl DevelopmentRule {
    pub const ALL: [DevelopmentRule; 1] = [DevelopmentRule::Security];

    pub fn uri(&self) -> &'static str {
        match self {
            DevelopmentRule::Security => "resource://security-rules",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DevelopmentRule::Security => "SecurityRules",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DevelopmentRule::Security => "This is a security rules.",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            DevelopmentRule::Security => "CODE_SECURITY_RULES.md",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rule| rule.uri() == uri)
    }
}

/// Rule documents read from a directory.
///
/// Files are read on every access so edits show up without a restart.
#[derive(Debug, Clone)]
pub struct RuleLibrary {
    dir: PathBuf,
}

impl RuleLibrary {
    /// Open `dir` as a rules directory. Fails when `dir` is not a directory; individual rule
    /// files may still be missing and are reported when read.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ResourceError::NotFound(format!(
                "rules directory {}",
                dir.display()
            )));
        }
        for rule in DevelopmentRule::ALL {
            if !dir.join(rule.file_name()).is_file() {
                log::warn!(
                    "rule file {} missing from {}",
                    rule.file_name(),
                    dir.display()
                );
            }
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, rule: DevelopmentRule) -> PathBuf {
        self.dir.join(rule.file_name())
    }

    /// Read the text of `rule`.
    pub fn read(&self, rule: DevelopmentRule) -> Result<String, ResourceError> {
        let path = self.path_of(rule);
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ResourceError::NotFound(rule.uri().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                ResourceError::PermissionDenied(rule.uri().to_string())
            }
            _ => ResourceError::ProtocolError(format!("{}: {}", path.display(), e)),
        })
    }
}

/// Publishes every [`DevelopmentRule`] as a Markdown resource.
pub struct SecurityRulesResource {
    rules: Arc<RuleLibrary>,
}

impl SecurityRulesResource {
    pub fn new(rules: Arc<RuleLibrary>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl ResourceProtocol for SecurityRulesResource {
    async fn list_resources(&self) -> Result<Vec<ResourceMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(DevelopmentRule::ALL
            .into_iter()
            .map(|rule| {
                ResourceMetadata::new(rule.uri(), rule.description())
                    .with_name(rule.name())
                    .with_mime_type("text/markdown")
            })
            .collect())
    }

    async fn read_resource(&self, uri: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let rule = DevelopmentRule::from_uri(uri)
            .ok_or_else(|| ResourceError::NotFound(uri.to_string()))?;
        Ok(self.rules.read(rule)?)
    }

    fn protocol_name(&self) -> &str {
        "development-rules"
    }
}

/// The `analyze_code_secure` tool: reviews code against the security rules.
pub struct SecurityReviewProtocol {
    rules: Arc<RuleLibrary>,
    llm: Arc<dyn ClientWrapper>,
}

impl SecurityReviewProtocol {
    pub fn new(rules: Arc<RuleLibrary>, llm: Arc<dyn ClientWrapper>) -> Self {
        Self { rules, llm }
    }

    async fn review(&self, code: &str) -> Result<String, String> {
        let rule = self
            .rules
            .read(DevelopmentRule::Security)
            .map_err(|e| format!("Error loading security rules: {}", e))?;
        let system = review_system_prompt(&rule);
        let prompt = format!("You should analyze the code following the security rule: {}", code);
        sampling::sample(
            self.llm.as_ref(),
            Some(&system),
            &prompt,
            "The code review could not be completed.",
        )
        .await
        .map_err(|e| format!("Error analyzing code: {}", e))
    }
}

/// System prompt framing the reviewer with the rule text.
pub fn review_system_prompt(rule: &str) -> String {
    format!(
        "You are an OpenStack software developer. You must follow this predefined rule:\n\n{}\n\n\
         If you find a problem, fix it.",
        rule
    )
}

#[async_trait]
impl ToolProtocol for SecurityReviewProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        if tool_name != ANALYZE_CODE_SECURE {
            return Err(Box::new(ToolError::NotFound(tool_name.to_string())));
        }
        let code = required_str(&parameters, "code")?;
        Ok(match self.review(code).await {
            Ok(review) => ToolResult::text(review),
            Err(message) => {
                log::warn!("{} failed: {}", ANALYZE_CODE_SECURE, message);
                ToolResult::failure(message)
            }
        })
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(vec![ToolMetadata::new(
            ANALYZE_CODE_SECURE,
            "Review code against the security rules and propose fixes",
        )
        .with_parameter(
            ToolParameter::new("code", ToolParameterType::String)
                .with_description("Source code to review")
                .required(),
        )])
    }

    fn protocol_name(&self) -> &str {
        "security-review"
    }
}
