//! Keystone v3 password authentication and service catalog lookup.
//!
//! Credentials come from the usual `OS_*` environment variables or, when those are incomplete,
//! from a named cloud in `clouds.yaml`. A [`Session`] is established once; its token is never
//! refreshed.

use super::CloudError;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Header carrying the issued token in Keystone responses and in authenticated requests.
pub const AUTH_TOKEN_HEADER: &str = "X-Subject-Token";
pub const REQUEST_TOKEN_HEADER: &str = "X-Auth-Token";

/// Everything needed to obtain a project-scoped token.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudCredentials {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    pub user_domain_name: String,
    pub project_domain_name: String,
    pub region_name: String,
    /// Endpoint interface: `public`, `internal` or `admin`.
    pub interface: String,
    pub identity_api_version: String,
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("project_name", &self.project_name)
            .field("user_domain_name", &self.user_domain_name)
            .field("project_domain_name", &self.project_domain_name)
            .field("region_name", &self.region_name)
            .field("interface", &self.interface)
            .field("identity_api_version", &self.identity_api_version)
            .finish()
    }
}

impl CloudCredentials {
    /// Credentials with the standard defaults for domain, region and interface.
    pub fn new(
        auth_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            username: username.into(),
            password: password.into(),
            project_name: project_name.into(),
            user_domain_name: "Default".to_string(),
            project_domain_name: "Default".to_string(),
            region_name: "RegionOne".to_string(),
            interface: "public".to_string(),
            identity_api_version: "3".to_string(),
        }
    }

    /// Load credentials from `OS_*` variables, falling back to `clouds.yaml`.
    pub fn from_env() -> Result<Self, CloudError> {
        Self::from_lookup(|key| std::env::var(key).ok(), &default_clouds_yaml_paths())
    }

    /// Resolve credentials through `lookup`, searching `clouds_yaml_paths` in order when the
    /// `OS_*` variables are incomplete.
    pub fn from_lookup<F>(lookup: F, clouds_yaml_paths: &[PathBuf]) -> Result<Self, CloudError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let (Some(auth_url), Some(username), Some(password), Some(project_name)) = (
            var("OS_AUTH_URL"),
            var("OS_USERNAME"),
            var("OS_PASSWORD"),
            var("OS_PROJECT_NAME"),
        ) {
            let mut creds = Self::new(auth_url, username, password, project_name);
            if let Some(v) = var("OS_USER_DOMAIN_NAME") {
                creds.user_domain_name = v;
            }
            if let Some(v) = var("OS_PROJECT_DOMAIN_NAME") {
                creds.project_domain_name = v;
            }
            if let Some(v) = var("OS_REGION_NAME") {
                creds.region_name = v;
            }
            if let Some(v) = var("OS_INTERFACE") {
                creds.interface = v;
            }
            if let Some(v) = var("OS_IDENTITY_API_VERSION") {
                creds.identity_api_version = v;
            }
            return Ok(creds);
        }

        let cloud = var("OS_CLOUD").unwrap_or_else(|| "openstack".to_string());
        let path = clouds_yaml_paths
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| {
                CloudError::Configuration(
                    "set OS_AUTH_URL, OS_USERNAME, OS_PASSWORD and OS_PROJECT_NAME, or provide clouds.yaml"
                        .to_string(),
                )
            })?;
        Self::from_clouds_yaml(path, &cloud)
    }

    /// Read the cloud named `cloud` from a `clouds.yaml` file.
    pub fn from_clouds_yaml(path: &Path, cloud: &str) -> Result<Self, CloudError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CloudError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse_clouds_yaml(&raw, cloud)
    }

    /// Parse `clouds.yaml` text and extract the named cloud.
    pub fn parse_clouds_yaml(raw: &str, cloud: &str) -> Result<Self, CloudError> {
        let file: CloudsFile = serde_yaml::from_str(raw)
            .map_err(|e| CloudError::Configuration(format!("invalid clouds.yaml: {}", e)))?;
        let entry = file.clouds.get(cloud).ok_or_else(|| {
            CloudError::Configuration(format!("cloud '{}' not found in clouds.yaml", cloud))
        })?;

        let required = |field: &Option<String>, name: &str| {
            field.clone().filter(|v| !v.is_empty()).ok_or_else(|| {
                CloudError::Configuration(format!("cloud '{}' is missing auth.{}", cloud, name))
            })
        };

        let mut creds = Self::new(
            required(&entry.auth.auth_url, "auth_url")?,
            required(&entry.auth.username, "username")?,
            required(&entry.auth.password, "password")?,
            required(&entry.auth.project_name, "project_name")?,
        );
        if let Some(v) = entry.auth.user_domain_name.clone() {
            creds.user_domain_name = v;
        }
        if let Some(v) = entry.auth.project_domain_name.clone() {
            creds.project_domain_name = v;
        }
        if let Some(v) = entry.region_name.clone() {
            creds.region_name = v;
        }
        if let Some(v) = entry.interface.clone() {
            creds.interface = v;
        }
        if let Some(v) = entry.identity_api_version.as_ref() {
            creds.identity_api_version = yaml_scalar(v);
        }
        Ok(creds)
    }

    /// Identity endpoint normalised to end in `/v3`.
    pub fn identity_v3_url(&self) -> String {
        let base = self.auth_url.trim_end_matches('/');
        if base.ends_with("/v3") {
            base.to_string()
        } else {
            format!("{}/v3", base)
        }
    }

    /// Keystone v3 password authentication body, scoped to the project.
    pub fn token_request_body(&self) -> serde_json::Value {
        json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.username,
                            "domain": {"name": self.user_domain_name},
                            "password": self.password
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": self.project_name,
                        "domain": {"name": self.project_domain_name}
                    }
                }
            }
        })
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Standard `clouds.yaml` search path.
pub fn default_clouds_yaml_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("clouds.yaml")];
    if let Ok(home) = std::env::var("HOME") {
        paths.push(Path::new(&home).join(".config/openstack/clouds.yaml"));
    }
    paths.push(PathBuf::from("/etc/openstack/clouds.yaml"));
    paths
}

#[derive(Debug, Deserialize)]
struct CloudsFile {
    clouds: HashMap<String, CloudEntry>,
}

#[derive(Debug, Deserialize)]
struct CloudEntry {
    auth: CloudAuth,
    region_name: Option<String>,
    interface: Option<String>,
    identity_api_version: Option<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct CloudAuth {
    auth_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    project_name: Option<String>,
    user_domain_name: Option<String>,
    project_domain_name: Option<String>,
}

/// One endpoint of a catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

/// A service entry of the Keystone catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogService {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogService>,
    #[serde(default)]
    expires_at: Option<String>,
}

/// An authenticated Keystone session.
#[derive(Clone)]
pub struct Session {
    token: String,
    catalog: Vec<CatalogService>,
    region: String,
    interface: String,
    expires_at: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("services", &self.catalog.len())
            .field("region", &self.region)
            .field("interface", &self.interface)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    /// Build a session from an existing token and catalog.
    pub fn new(
        token: impl Into<String>,
        catalog: Vec<CatalogService>,
        region: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            catalog,
            region: region.into(),
            interface: interface.into(),
            expires_at: None,
        }
    }

    /// Request a project-scoped token from Keystone.
    pub async fn authenticate(
        http: &reqwest::Client,
        credentials: &CloudCredentials,
    ) -> Result<Self, CloudError> {
        if credentials.identity_api_version.trim_start_matches('v') != "3" {
            return Err(CloudError::Configuration(format!(
                "unsupported identity API version {}",
                credentials.identity_api_version
            )));
        }

        let url = format!("{}/auth/tokens", credentials.identity_v3_url());
        log::debug!("requesting Keystone token from {}", url);

        let response = http
            .post(&url)
            .json(&credentials.token_request_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::Authentication(format!(
                "Keystone returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let token = response
            .headers()
            .get(AUTH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                CloudError::Authentication(format!("response had no {} header", AUTH_TOKEN_HEADER))
            })?;

        let body: TokenResponse = response.json().await?;
        log::info!(
            "authenticated as {} in project {} ({} catalog services)",
            credentials.username,
            credentials.project_name,
            body.token.catalog.len()
        );

        Ok(Self {
            token,
            catalog: body.token.catalog,
            region: credentials.region_name.clone(),
            interface: credentials.interface.clone(),
            expires_at: body.token.expires_at,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<&str> {
        self.expires_at.as_deref()
    }

    /// Resolve the endpoint URL for `service_type` using the session's interface and region.
    ///
    /// Endpoints without region information are accepted when no region-specific endpoint
    /// exists. The returned URL has no trailing slash.
    pub fn endpoint(&self, service_type: &str) -> Result<String, CloudError> {
        let service = self
            .catalog
            .iter()
            .find(|s| s.service_type == service_type)
            .ok_or_else(|| CloudError::EndpointNotFound(service_type.to_string()))?;

        let candidates = service
            .endpoints
            .iter()
            .filter(|e| e.interface.eq_ignore_ascii_case(&self.interface));

        let mut regionless = None;
        for endpoint in candidates {
            let region = endpoint.region_id.as_ref().or(endpoint.region.as_ref());
            match region {
                Some(r) if r == &self.region => {
                    return Ok(endpoint.url.trim_end_matches('/').to_string())
                }
                None if regionless.is_none() => regionless = Some(endpoint),
                _ => {}
            }
        }

        regionless
            .map(|e| e.url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                CloudError::EndpointNotFound(format!(
                    "{} ({} interface, region {})",
                    service_type, self.interface, self.region
                ))
            })
    }
}
