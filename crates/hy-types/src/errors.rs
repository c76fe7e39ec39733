//! Error classification shared by every crate for logging.

use serde::{Deserialize, Serialize};
use std::fmt;

/// High-level error classification.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// I/O or network connectivity errors.
    Io,
    /// Operation timed out.
    Timeout,
    /// Operation was cancelled by the caller.
    Cancelled,
    /// Authentication material could not be used.
    Auth,
    /// Protocol-level error (handshake, framing, etc.).
    Protocol,
    /// User configuration is unusable.
    Config,
    /// TLS trust material is unusable.
    Tls,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Auth => "auth",
            Self::Protocol => "protocol",
            Self::Config => "config",
            Self::Tls => "tls",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
