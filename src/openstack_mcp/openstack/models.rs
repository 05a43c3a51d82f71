//! Resource models decoded from the Nova, Glance and Neutron REST APIs.
//!
//! Only the attributes surfaced by the MCP tools are modelled. Fields whose shape varies
//! between API microversions (`flavor`, `image`, `addresses`, `fault`, flavor `swap`) stay as
//! raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filters applied when listing servers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerQuery {
    /// Server status such as `ACTIVE`, `SHUTOFF` or `ERROR`.
    pub status: Option<String>,
}

impl ServerQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by status; the value is upper-cased as Nova expects.
    pub fn with_status(mut self, status: impl AsRef<str>) -> Self {
        let status = status.as_ref().trim();
        self.status = if status.is_empty() {
            None
        } else {
            Some(status.to_uppercase())
        };
        self
    }
}

/// A Nova server as returned by `GET /servers/{id}` or `/servers/detail`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub flavor: Value,
    /// Object for image-backed servers, empty string when booted from volume.
    #[serde(default)]
    pub image: Value,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub addresses: Value,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub fault: Option<Value>,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub security_groups: Option<Value>,
    #[serde(rename = "OS-EXT-AZ:availability_zone", default)]
    pub availability_zone: Option<String>,
    #[serde(rename = "OS-EXT-STS:power_state", default)]
    pub power_state: Option<i64>,
    #[serde(rename = "OS-EXT-STS:task_state", default)]
    pub task_state: Option<String>,
    #[serde(rename = "OS-EXT-STS:vm_state", default)]
    pub vm_state: Option<String>,
}

impl Server {
    /// Flavor name when the API embeds it, otherwise the flavor ID.
    pub fn flavor_label(&self) -> String {
        label_of(&self.flavor)
    }

    /// Image name or ID, `"N/A"` for volume-backed servers.
    pub fn image_label(&self) -> String {
        label_of(&self.image)
    }

    /// Human readable power state (`RUNNING`, `SHUTDOWN`, ...).
    pub fn power_state_name(&self) -> &'static str {
        match self.power_state {
            Some(0) => "NOSTATE",
            Some(1) => "RUNNING",
            Some(3) => "PAUSED",
            Some(4) => "SHUTDOWN",
            Some(6) => "CRASHED",
            Some(7) => "SUSPENDED",
            _ => "N/A",
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("ERROR")
    }
}

fn label_of(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .get("original_name")
            .or_else(|| map.get("name"))
            .or_else(|| map.get("id"))
            .and_then(Value::as_str)
            .unwrap_or("N/A")
            .to_string(),
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => "N/A".to_string(),
    }
}

/// A Glance v2 image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A Neutron network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub admin_state_up: bool,
    #[serde(rename = "router:external", default)]
    pub router_external: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub subnets: Vec<String>,
}

/// A Nova flavor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vcpus: u32,
    /// Memory in MiB.
    #[serde(default)]
    pub ram: u64,
    /// Root disk in GiB.
    #[serde(default)]
    pub disk: u64,
    #[serde(rename = "OS-FLV-EXT-DATA:ephemeral", default)]
    pub ephemeral: u64,
    /// Older microversions report no swap as `""`.
    #[serde(default)]
    pub swap: Value,
    #[serde(rename = "os-flavor-access:is_public", default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_decodes_extension_attributes() {
        let server: Server = serde_json::from_value(json!({
            "id": "a1",
            "name": "web-1",
            "status": "ERROR",
            "flavor": {"original_name": "m1.small", "vcpus": 1},
            "image": "",
            "created": "2024-01-01T00:00:00Z",
            "fault": {"code": 500, "message": "No valid host was found."},
            "OS-EXT-STS:power_state": 4,
            "OS-EXT-STS:vm_state": "error",
            "OS-EXT-STS:task_state": null,
            "OS-EXT-AZ:availability_zone": "nova"
        }))
        .unwrap();

        assert_eq!(server.flavor_label(), "m1.small");
        assert_eq!(server.image_label(), "N/A");
        assert_eq!(server.power_state_name(), "SHUTDOWN");
        assert_eq!(server.vm_state.as_deref(), Some("error"));
        assert!(server.task_state.is_none());
        assert!(server.is_error());
        assert_eq!(server.availability_zone.as_deref(), Some("nova"));
    }

    #[test]
    fn test_flavor_label_falls_back_to_id() {
        let server: Server = serde_json::from_value(json!({
            "id": "b2",
            "flavor": {"id": "42"},
            "image": {"id": "img-1"}
        }))
        .unwrap();
        assert_eq!(server.flavor_label(), "42");
        assert_eq!(server.image_label(), "img-1");
        assert_eq!(server.power_state_name(), "N/A");
    }

    #[test]
    fn test_network_and_flavor_renamed_fields() {
        let network: Network = serde_json::from_value(json!({
            "id": "n1",
            "name": "public",
            "status": "ACTIVE",
            "admin_state_up": true,
            "router:external": true,
            "shared": false,
            "subnets": ["s1", "s2"]
        }))
        .unwrap();
        assert!(network.router_external);
        assert_eq!(network.subnets.len(), 2);

        let flavor: Flavor = serde_json::from_value(json!({
            "id": "1",
            "name": "m1.tiny",
            "vcpus": 1,
            "ram": 512,
            "disk": 1,
            "OS-FLV-EXT-DATA:ephemeral": 0,
            "swap": "",
            "os-flavor-access:is_public": false
        }))
        .unwrap();
        assert!(!flavor.is_public);
        assert_eq!(flavor.swap, json!(""));
    }

    #[test]
    fn test_server_query_uppercases_status() {
        assert_eq!(
            ServerQuery::new().with_status("shutoff").status.as_deref(),
            Some("SHUTOFF")
        );
        assert!(ServerQuery::new().with_status("  ").status.is_none());
    }
}
