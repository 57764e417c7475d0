//! Typed view of the service declaration file.

use crate::utils::error::{CopyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// File names the orchestration runtime looks for, in its order.
pub const DEFAULT_COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeFile {
    #[serde(default)]
    pub version: Option<serde_yaml::Value>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub command: Option<Command>,
    #[serde(default)]
    pub restart: Option<RestartPolicy>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub ports: Vec<PortEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Shell(String),
    Exec(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    Always,
    OnFailure,
    UnlessStopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Environment {
    /// `KEY=value` entries
    List(Vec<String>),
    /// `KEY: value`; scalars of any YAML type, null inherits from the host
    Map(BTreeMap<String, Option<serde_yaml::Value>>),
}

impl Environment {
    /// Flattens either form into key → string.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        match self {
            Environment::List(entries) => entries
                .iter()
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (entry.clone(), String::new()),
                })
                .collect(),
            Environment::Map(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_ref().map(scalar_to_string).unwrap_or_default()))
                .collect(),
        }
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// One `ports:` entry as written: `"3306:3306"` or a bare `5432`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortEntry {
    Number(u64),
    Text(String),
    /// Negative or fractional numbers, long-syntax mappings: reported by the
    /// linter instead of failing the whole file.
    Other(serde_yaml::Value),
}

impl fmt::Display for PortEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortEntry::Number(n) => write!(f, "{}", n),
            PortEntry::Text(s) => write!(f, "{}", s),
            PortEntry::Other(value) => write!(f, "{}", scalar_to_string(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    /// None lets the runtime pick an ephemeral port.
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    /// Parses the short syntax `[host_ip:][host_port:]container_port[/protocol]`.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty port mapping".to_string());
        }

        let (binding, protocol) = match text.rsplit_once('/') {
            Some((binding, "tcp")) => (binding, Protocol::Tcp),
            Some((binding, "udp")) => (binding, Protocol::Udp),
            Some((_, other)) => return Err(format!("unknown protocol '{}'", other)),
            None => (text, Protocol::Tcp),
        };

        // A bracketed IPv6 host address carries its own colons.
        let (host_ip, rest) = if let Some(stripped) = binding.strip_prefix('[') {
            let (ip, rest) = stripped
                .split_once("]:")
                .ok_or_else(|| format!("malformed IPv6 binding '{}'", binding))?;
            (Some(ip.to_string()), rest)
        } else {
            (None, binding)
        };

        let parts: Vec<&str> = rest.split(':').collect();
        let (host_ip, host_port, container_port) = match (host_ip, parts.as_slice()) {
            (None, [container]) => (None, None, *container),
            (None, [host, container]) => (None, Some(*host), *container),
            (None, [ip, host, container]) => (Some(ip.to_string()), Some(*host), *container),
            (Some(ip), [host, container]) => (Some(ip), Some(*host), *container),
            (Some(ip), [container]) => (Some(ip), None, *container),
            _ => return Err(format!("too many ':' separators in '{}'", text)),
        };

        let host_port = match host_port {
            Some("") | None => None,
            Some(port) => Some(parse_port(port)?),
        };

        Ok(Self {
            host_ip: host_ip.filter(|ip| !ip.is_empty()),
            host_port,
            container_port: parse_port(container_port)?,
            protocol,
        })
    }

    /// True when both bindings would claim the same host socket.
    pub fn collides_with(&self, other: &PortMapping) -> bool {
        let (Some(a), Some(b)) = (self.host_port, other.host_port) else {
            return false;
        };
        a == b && self.protocol == other.protocol && ips_overlap(&self.host_ip, &other.host_ip)
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ip) = &self.host_ip {
            if ip.contains(':') {
                write!(f, "[{}]:", ip)?;
            } else {
                write!(f, "{}:", ip)?;
            }
        }
        if let Some(port) = self.host_port {
            write!(f, "{}:", port)?;
        }
        write!(f, "{}/{}", self.container_port, self.protocol)
    }
}

/// An absent host IP binds every address of both families. `0.0.0.0` only
/// covers IPv4 and `::` only IPv6.
fn ips_overlap(a: &Option<String>, b: &Option<String>) -> bool {
    let (Some(a), Some(b)) = (a.as_deref(), b.as_deref()) else {
        return true;
    };
    let is_v6 = |ip: &str| ip.contains(':');
    if is_v6(a) != is_v6(b) {
        return false;
    }
    a == b || matches!(a, "0.0.0.0" | "::") || matches!(b, "0.0.0.0" | "::")
}

fn parse_port(text: &str) -> std::result::Result<u16, String> {
    if text.contains('-') {
        return Err(format!("port ranges are not supported: '{}'", text));
    }
    let value: u32 = text
        .parse()
        .map_err(|_| format!("'{}' is not a port number", text))?;
    match u16::try_from(value) {
        Ok(0) => Err("port 0 is not a valid binding".to_string()),
        Ok(port) => Ok(port),
        Err(_) => Err(format!("port {} is out of range", value)),
    }
}

impl ServiceDefinition {
    /// Parses every `ports:` entry, keeping each entry's text next to its
    /// result.
    pub fn port_mappings(&self) -> Vec<(String, std::result::Result<PortMapping, String>)> {
        self.ports
            .iter()
            .map(|entry| {
                let text = entry.to_string();
                let parsed = match entry {
                    PortEntry::Number(n) => u16::try_from(*n)
                        .map_err(|_| format!("port {} is out of range", n))
                        .and_then(|_| PortMapping::parse(&text)),
                    PortEntry::Text(s) => PortMapping::parse(s),
                    PortEntry::Other(_) => Err(format!("unsupported port entry '{}'", text)),
                };
                (text, parsed)
            })
            .collect()
    }

    pub fn environment_map(&self) -> BTreeMap<String, String> {
        self.environment
            .as_ref()
            .map(Environment::to_map)
            .unwrap_or_default()
    }

    pub fn env(&self, key: &str) -> Option<String> {
        self.environment_map().remove(key)
    }

    /// Host port published for `container_port` over TCP.
    pub fn host_port_for(&self, container_port: u16) -> Option<u16> {
        self.port_mappings()
            .into_iter()
            .filter_map(|(_, parsed)| parsed.ok())
            .filter(|m| m.container_port == container_port && m.protocol == Protocol::Tcp)
            .find_map(|m| m.host_port)
    }

    /// Image reference without tag or digest: `docker.io/library/mysql`.
    pub fn image_name(&self) -> &str {
        split_image(&self.image).0
    }

    /// Tag or digest; `latest` when the reference carries neither.
    pub fn image_tag(&self) -> &str {
        split_image(&self.image).1.unwrap_or("latest")
    }

    pub fn has_explicit_tag(&self) -> bool {
        split_image(&self.image).1.is_some()
    }

    /// Last path component of the image name: `mysql`, `postgres`.
    pub fn image_family(&self) -> &str {
        self.image_name().rsplit('/').next().unwrap_or_default()
    }
}

fn split_image(reference: &str) -> (&str, Option<&str>) {
    let reference = reference.trim();
    if let Some((name, digest)) = reference.split_once('@') {
        return (name, Some(digest));
    }
    // A ':' before the last '/' belongs to a registry host:port.
    let last_slash = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[last_slash..].rfind(':') {
        Some(i) => (&reference[..last_slash + i], Some(&reference[last_slash + i + 1..])),
        None => (reference, None),
    }
}

impl ComposeFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| CopyError::ComposeError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parses the declaration. Duplicate keys anywhere are rejected.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // Mapping rejects repeated keys; HashMap/BTreeMap would keep the last.
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if !value.is_mapping() {
            return Err(CopyError::ComposeError {
                message: "top level must be a mapping".to_string(),
            });
        }
        Ok(serde_yaml::from_value(value)?)
    }

    pub fn find_in<P: AsRef<Path>>(dir: P) -> Option<PathBuf> {
        DEFAULT_COMPOSE_FILES
            .iter()
            .map(|name| dir.as_ref().join(name))
            .find(|path| path.exists())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.get(name)
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }
}
