//! Generic network address used at the proxy-framework boundary.
//!
//! The transport library speaks `"host:port"` strings; the routing layer speaks
//! structured addresses. [`TargetAddr`] is the structured side and converts to
//! and from the string form without loss for IPv4, IPv6 and `host:port`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

/// Target address supporting both resolved IPs and unresolved domains.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TargetAddr {
    /// Domain name (not yet resolved).
    Domain(String, u16),
    /// IPv4/IPv6 socket address.
    Socket(SocketAddr),
}

/// Failure to split an address string into host and port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddrParseError {
    #[error("missing port in address {0:?}")]
    MissingPort(String),
    #[error("invalid port in address {0:?}")]
    InvalidPort(String),
    #[error("empty host in address {0:?}")]
    EmptyHost(String),
}

impl TargetAddr {
    #[inline]
    pub fn domain(host: impl Into<String>, port: u16) -> Self {
        Self::Domain(host.into(), port)
    }

    #[inline]
    pub fn socket(addr: SocketAddr) -> Self {
        Self::Socket(addr)
    }

    #[inline]
    pub fn ip(ip: IpAddr, port: u16) -> Self {
        Self::Socket(SocketAddr::new(ip, port))
    }

    #[inline]
    pub fn port(&self) -> u16 {
        match self {
            Self::Domain(_, port) => *port,
            Self::Socket(addr) => addr.port(),
        }
    }

    /// Host part without brackets (domain or IP literal).
    #[inline]
    pub fn host(&self) -> String {
        match self {
            Self::Domain(domain, _) => domain.clone(),
            Self::Socket(addr) => addr.ip().to_string(),
        }
    }

    #[inline]
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(..))
    }

    /// Resolved socket address, if this is not a domain.
    #[inline]
    pub fn as_socket(&self) -> Option<SocketAddr> {
        match self {
            Self::Socket(addr) => Some(*addr),
            Self::Domain(..) => None,
        }
    }

    /// Build from a host and port, promoting IP literals to [`TargetAddr::Socket`].
    pub fn from_host_port(host: &str, port: u16) -> Self {
        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        match bare.parse::<IpAddr>() {
            Ok(ip) => Self::ip(ip, port),
            Err(_) => Self::Domain(bare.to_string(), port),
        }
    }
}

impl FromStr for TargetAddr {
    type Err = AddrParseError;

    /// Parses `1.2.3.4:53`, `[::1]:53` and `example.com:53`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(sa) = s.parse::<SocketAddr>() {
            return Ok(Self::Socket(sa));
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddrParseError::MissingPort(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| AddrParseError::InvalidPort(s.to_string()))?;
        if host.is_empty() {
            return Err(AddrParseError::EmptyHost(s.to_string()));
        }
        Ok(Self::from_host_port(host, port))
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(host, port) if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Self::Domain(host, port) => write!(f, "{}:{}", host, port),
            Self::Socket(addr) => write!(f, "{}", addr),
        }
    }
}

impl From<SocketAddr> for TargetAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::Socket(addr)
    }
}

impl From<(String, u16)> for TargetAddr {
    fn from((host, port): (String, u16)) -> Self {
        Self::from_host_port(&host, port)
    }
}

impl From<(&str, u16)> for TargetAddr {
    fn from((host, port): (&str, u16)) -> Self {
        Self::from_host_port(host, port)
    }
}
