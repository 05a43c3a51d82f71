//! Access control for the HTTP transport: client IP allow-lists and credential checks.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// IP filter for restricting server access
#[derive(Debug, Clone, Default)]
pub struct IpFilter {
    allowed: Vec<IpFilterEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IpFilterEntry {
    Single(IpAddr),
    Cidr { network: IpAddr, prefix_len: u8 },
}

impl IpFilter {
    /// Create a new empty IP filter (allows all)
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter admitting only `127.0.0.1` and `::1`.
    pub fn localhost() -> Self {
        Self {
            allowed: vec![
                IpFilterEntry::Single(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                IpFilterEntry::Single(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            ],
        }
    }

    /// Build a filter from a list of addresses and CIDR blocks.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for entry in entries {
            filter.allow(entry.as_ref())?;
        }
        Ok(filter)
    }

    /// Add an allowed IP address (`10.0.0.5`, `::1`) or CIDR block (`10.0.0.0/8`).
    pub fn allow(&mut self, ip_or_cidr: &str) -> Result<(), String> {
        let ip_or_cidr = ip_or_cidr.trim();
        let entry = match ip_or_cidr.split_once('/') {
            Some((network, prefix)) => {
                let network = IpAddr::from_str(network)
                    .map_err(|e| format!("Invalid network address '{}': {}", network, e))?;
                let prefix_len: u8 = prefix
                    .parse()
                    .map_err(|_| format!("Invalid CIDR prefix length: {}", prefix))?;
                let max_prefix = if network.is_ipv4() { 32 } else { 128 };
                if prefix_len > max_prefix {
                    return Err(format!(
                        "CIDR prefix length {} exceeds maximum {} for {}",
                        prefix_len, max_prefix, network
                    ));
                }
                IpFilterEntry::Cidr {
                    network,
                    prefix_len,
                }
            }
            None => IpFilterEntry::Single(
                IpAddr::from_str(ip_or_cidr)
                    .map_err(|e| format!("Invalid IP address '{}': {}", ip_or_cidr, e))?,
            ),
        };
        self.allowed.push(entry);
        Ok(())
    }

    /// Whether the filter has any entries.
    pub fn is_restricted(&self) -> bool {
        !self.allowed.is_empty()
    }

    /// Check if an IP address is allowed. An empty filter allows everyone.
    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let ip = canonical(ip);
        self.allowed.iter().any(|entry| match entry {
            IpFilterEntry::Single(allowed) => ip == canonical(*allowed),
            IpFilterEntry::Cidr {
                network,
                prefix_len,
            } => in_cidr(ip, *network, *prefix_len),
        })
    }
}

/// IPv4-mapped IPv6 addresses (`::ffff:10.0.0.1`) compare as IPv4.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

fn in_cidr(ip: IpAddr, network: IpAddr, prefix_len: u8) -> bool {
    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
            (u32::from(ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            let mask = u128::MAX.checked_shl(128 - prefix_len as u32).unwrap_or(0);
            (u128::from(ip) & mask) == (u128::from(net) & mask)
        }
        _ => false,
    }
}

/// Authentication configuration for the HTTP transport
#[derive(Clone, Default)]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: Basic base64(username:password)`
    Basic { username: String, password: String },
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::None => write!(f, "None"),
            AuthConfig::Bearer(_) => write!(f, "Bearer(<redacted>)"),
            AuthConfig::Basic { username, .. } => {
                write!(f, "Basic {{ username: {:?}, password: <redacted> }}", username)
            }
        }
    }
}

impl AuthConfig {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, AuthConfig::None)
    }

    /// Validate an `Authorization` header value. A missing header only passes when no
    /// authentication is configured.
    pub fn validate(&self, header: Option<&str>) -> bool {
        match (self, header) {
            (AuthConfig::None, _) => true,
            (_, None) => false,
            (AuthConfig::Bearer(token), Some(header)) => header
                .strip_prefix("Bearer ")
                .map(|provided| digest_eq(token.as_bytes(), provided.trim().as_bytes()))
                .unwrap_or(false),
            (AuthConfig::Basic { username, password }, Some(header)) => header
                .strip_prefix("Basic ")
                .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
                .map(|decoded| {
                    digest_eq(format!("{}:{}", username, password).as_bytes(), &decoded)
                })
                .unwrap_or(false),
        }
    }
}

/// Constant-time comparison of SHA-256 digests.
fn digest_eq(expected: &[u8], provided: &[u8]) -> bool {
    let expected = Sha256::digest(expected);
    let provided = Sha256::digest(provided);
    expected.ct_eq(&provided).into()
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    /// The client IP is not on the allow-list (HTTP 403).
    Forbidden,
    /// Credentials are missing or wrong (HTTP 401).
    Unauthorized,
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDenied::Forbidden => write!(f, "IP not allowed"),
            AccessDenied::Unauthorized => write!(f, "invalid or missing credentials"),
        }
    }
}

/// IP filter and authentication applied together to every HTTP request.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    pub ip_filter: IpFilter,
    pub auth: AuthConfig,
}

impl AccessPolicy {
    pub fn new(ip_filter: IpFilter, auth: AuthConfig) -> Self {
        Self { ip_filter, auth }
    }

    /// IP filtering runs before authentication.
    pub fn check(&self, client: IpAddr, authorization: Option<&str>) -> Result<(), AccessDenied> {
        if !self.ip_filter.is_allowed(client) {
            return Err(AccessDenied::Forbidden);
        }
        if !self.auth.validate(authorization) {
            return Err(AccessDenied::Unauthorized);
        }
        Ok(())
    }
}
