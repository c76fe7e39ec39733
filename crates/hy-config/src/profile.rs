//! Outbound connection profile.
//!
//! Field names follow proxy configuration files (`skip-cert-verify` is kebab
//! case, everything else snake case). Only `name`, `server` and `port` are
//! required.

use crate::bandwidth::{BandwidthError, Speed};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("read profile: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse profile json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parse profile yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Hysteria outbound options, immutable once parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub server: String,
    pub port: u16,
    /// Transport protocol tag; empty means plain UDP.
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub up: String,
    #[serde(default)]
    pub up_mbps: u32,
    #[serde(default)]
    pub down: String,
    #[serde(default)]
    pub down_mbps: u32,
    /// Base64 secret. When present, `auth_str` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(default)]
    pub auth_str: String,
    #[serde(default)]
    pub obfs: String,
    #[serde(default)]
    pub sni: String,
    #[serde(default, rename = "skip-cert-verify")]
    pub skip_cert_verify: bool,
    #[serde(default)]
    pub alpn: Vec<String>,
    /// CA file path; wins over `ca_str` when non-empty.
    #[serde(default)]
    pub ca: String,
    #[serde(default)]
    pub ca_str: String,
    #[serde(default)]
    pub recv_window_conn: u64,
    #[serde(default)]
    pub recv_window: u64,
    #[serde(default)]
    pub disable_mtu_discovery: bool,
    #[serde(default)]
    pub udp: bool,
    #[serde(default, rename = "interface-name", skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
    #[serde(default, rename = "routing-mark", skip_serializing_if = "Option::is_none")]
    pub routing_mark: Option<u32>,
}

impl ConnectionProfile {
    pub fn from_json_str(s: &str) -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ProfileError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Load from a file, trying JSON first and falling back to YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let text = fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&text) {
            Ok(v) => Ok(serde_json::from_value(v)?),
            Err(_) => Self::from_yaml_str(&text),
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.server.contains(':') && !self.server.starts_with('[') {
            format!("[{}]:{}", self.server, self.port)
        } else {
            format!("{}:{}", self.server, self.port)
        }
    }

    /// Resolve the upload/download pair in bytes per second.
    pub fn speed(&self) -> Result<Speed, BandwidthError> {
        Speed::resolve(&self.up, self.up_mbps, &self.down, self.down_mbps)
    }
}
