//! Configuration for the MCP servers.
//!
//! Provides plain structs that users can construct manually, plus loaders that read the
//! process environment. No config-file parsing dependencies are involved here; OpenStack
//! `clouds.yaml` handling lives in [`crate::openstack::auth`].
//!
//! # Example
//!
//! ```rust
//! use openstack_mcp::config::{ServerConfig, Transport};
//! use std::collections::HashMap;
//!
//! let env: HashMap<&str, &str> = [
//!     ("MCP_TRANSPORT", "http"),
//!     ("MCP_BIND", "0.0.0.0:9000"),
//!     ("LLM_API_KEY", "sk-test"),
//! ]
//! .into_iter()
//! .collect();
//!
//! let config = ServerConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
//! assert_eq!(config.transport, Transport::Http);
//! assert_eq!(config.bind_addr.port(), 9000);
//! ```

use crate::openstack_mcp::log_analysis::{DEFAULT_CONTEXT_LINES, DEFAULT_MAX_RECORDS};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default model used for sampling when `LLM_MODEL` is not set.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4.1-mini";

/// Default HTTP bind address when `MCP_BIND` is not set.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Error raised when configuration values are missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// How the server talks to its MCP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Newline-delimited JSON-RPC over stdin/stdout.
    Stdio,
    /// HTTP endpoints served by the axum adapter.
    Http,
}

impl std::str::FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(ConfigError(format!(
                "unknown MCP_TRANSPORT '{}', expected 'stdio' or 'http'",
                other
            ))),
        }
    }
}

/// Settings for the LLM used by the analysis tools.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    /// Optional OpenAI-compatible base URL (self-hosted gateways).
    pub base_url: Option<String>,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl LlmConfig {
    /// Read `LLM_API_KEY` (falling back to `OPENAI_API_KEY`), `LLM_MODEL` and `LLM_BASE_URL`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_empty(lookup("LLM_API_KEY"))
            .or_else(|| non_empty(lookup("OPENAI_API_KEY")))
            .ok_or_else(|| ConfigError("LLM_API_KEY or OPENAI_API_KEY must be set".into()))?;

        Ok(Self {
            api_key,
            model: non_empty(lookup("LLM_MODEL")).unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            base_url: non_empty(lookup("LLM_BASE_URL")),
        })
    }
}

/// Numeric limits used by the OpenStack analysis tools.
///
/// The extractor's record cap and the prompt excerpt size are deliberately separate values:
/// the first bounds the structured [`ScanResult`](crate::log_analysis::ScanResult), the second
/// bounds how many of those records are written into an LLM prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisLimits {
    /// Records retained by the extractor.
    pub max_scan_records: usize,
    /// Lines of context captured around each match.
    pub context_lines: usize,
    /// Records written into the instance-analysis prompt.
    pub prompt_record_limit: usize,
    /// Sample error lines listed per instance in bulk analysis.
    pub bulk_sample_errors: usize,
    /// Default `length` for `nova_console_log`.
    pub console_log_lines: usize,
    /// Default console length for `analyze_instance_errors`.
    pub analysis_log_lines: usize,
    /// Console length fetched per instance in bulk analysis.
    pub bulk_log_lines: usize,
    /// Console length fetched for recovery plans.
    pub recovery_log_lines: usize,
    /// Console length fetched for custom questions.
    pub question_log_lines: usize,
    /// Default `max_instances` for bulk analysis.
    pub bulk_max_instances: usize,
    /// Trailing log characters quoted in the instance-analysis prompt.
    pub analysis_tail_chars: usize,
    /// Trailing log characters quoted in the recovery prompt.
    pub recovery_tail_chars: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            max_scan_records: DEFAULT_MAX_RECORDS,
            context_lines: DEFAULT_CONTEXT_LINES,
            prompt_record_limit: 10,
            bulk_sample_errors: 3,
            console_log_lines: 50,
            analysis_log_lines: 200,
            bulk_log_lines: 100,
            recovery_log_lines: 300,
            question_log_lines: 250,
            bulk_max_instances: 10,
            analysis_tail_chars: 1500,
            recovery_tail_chars: 500,
        }
    }
}

/// Top-level configuration shared by both server binaries.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: Transport,
    /// Address the HTTP transport binds to.
    pub bind_addr: SocketAddr,
    /// Bearer token required on HTTP requests, if any.
    pub bearer_token: Option<String>,
    /// Allowed client IPs or CIDR blocks; empty allows everyone.
    pub allowed_ips: Vec<String>,
    /// Directory holding the development rule documents.
    pub rules_dir: PathBuf,
    pub llm: LlmConfig,
    pub limits: AnalysisLimits,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport = match non_empty(lookup("MCP_TRANSPORT")) {
            Some(value) => value.parse()?,
            None => Transport::Stdio,
        };

        let bind = non_empty(lookup("MCP_BIND")).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError(format!("invalid MCP_BIND '{}': {}", bind, e)))?;

        let allowed_ips = non_empty(lookup("MCP_ALLOWED_IPS"))
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            transport,
            bind_addr,
            bearer_token: non_empty(lookup("MCP_BEARER_TOKEN")),
            allowed_ips,
            rules_dir: non_empty(lookup("RULES_DIR"))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            llm: LlmConfig::from_lookup(&lookup)?,
            limits: AnalysisLimits::default(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk")])).unwrap();
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert!(config.bearer_token.is_none());
        assert!(config.allowed_ips.is_empty());
        assert_eq!(config.rules_dir, PathBuf::from("static"));
        assert_eq!(config.llm.api_key, "sk");
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.limits, AnalysisLimits::default());
    }

    #[test]
    fn test_llm_key_prefers_explicit_variable() {
        let llm = LlmConfig::from_lookup(lookup_from(&[
            ("LLM_API_KEY", "primary"),
            ("OPENAI_API_KEY", "secondary"),
            ("LLM_BASE_URL", "http://localhost:11434/"),
        ]))
        .unwrap();
        assert_eq!(llm.api_key, "primary");
        assert_eq!(llm.base_url.as_deref(), Some("http://localhost:11434/"));
    }

    #[test]
    fn test_missing_llm_key_is_an_error() {
        let err = ServerConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("LLM_API_KEY"));
    }

    #[test]
    fn test_allowed_ips_and_token() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("LLM_API_KEY", "k"),
            ("MCP_ALLOWED_IPS", "127.0.0.1, 10.0.0.0/8,,"),
            ("MCP_BEARER_TOKEN", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.allowed_ips, vec!["127.0.0.1", "10.0.0.0/8"]);
        assert_eq!(config.bearer_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(ServerConfig::from_lookup(lookup_from(&[
            ("LLM_API_KEY", "k"),
            ("MCP_TRANSPORT", "carrier-pigeon"),
        ]))
        .is_err());
        assert!(ServerConfig::from_lookup(lookup_from(&[
            ("LLM_API_KEY", "k"),
            ("MCP_BIND", "not-an-address"),
        ]))
        .is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let llm = LlmConfig::from_lookup(lookup_from(&[("LLM_API_KEY", "sk-very-secret")])).unwrap();
        assert!(!format!("{:?}", llm).contains("sk-very-secret"));
    }
}
