//! Error model for the hysteria outbound.
//!
//! Construction fails with [`AdapterError::Parse`] or [`AdapterError::Config`];
//! per-dial failures are [`AdapterError::Dial`] (the session's error, untouched)
//! or the context outcomes [`AdapterError::Cancelled`] / [`AdapterError::Timeout`].

use hy_config::BandwidthError;
use hy_tls::TlsError;
use hy_types::ErrorClass;
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Parse(#[from] BandwidthError),

    #[error("hysteria {addr} {kind}")]
    Config {
        addr: String,
        #[source]
        kind: ConfigErrorKind,
    },

    #[error(transparent)]
    Dial(io::Error),

    #[error("dial cancelled")]
    Cancelled,

    #[error("dial timed out after {0:?}")]
    Timeout(Duration),
}

/// What went wrong while building the client.
#[derive(Debug, Error)]
pub enum ConfigErrorKind {
    #[error("load ca error: {path}: {source}")]
    LoadCa {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse ca")]
    ParseCa,

    #[error("parse auth error: {0}")]
    ParseAuth(#[source] base64::DecodeError),

    #[error("create error: {0}")]
    Create(#[source] io::Error),

    #[error("tls error: {0}")]
    Tls(#[source] TlsError),
}

impl From<TlsError> for ConfigErrorKind {
    fn from(err: TlsError) -> Self {
        match err {
            TlsError::LoadCa { path, source } => Self::LoadCa { path, source },
            TlsError::ParseCa => Self::ParseCa,
            other => Self::Tls(other),
        }
    }
}

fn class_of_io(err: &io::Error) -> ErrorClass {
    match err.kind() {
        io::ErrorKind::TimedOut => ErrorClass::Timeout,
        io::ErrorKind::PermissionDenied => ErrorClass::Auth,
        io::ErrorKind::InvalidData | io::ErrorKind::Unsupported => ErrorClass::Protocol,
        _ => ErrorClass::Io,
    }
}

impl AdapterError {
    pub fn config(addr: impl Into<String>, kind: impl Into<ConfigErrorKind>) -> Self {
        Self::Config {
            addr: addr.into(),
            kind: kind.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Parse(_) => ErrorClass::Config,
            Self::Config { kind, .. } => match kind {
                ConfigErrorKind::LoadCa { .. } | ConfigErrorKind::ParseCa | ConfigErrorKind::Tls(_) => {
                    ErrorClass::Tls
                }
                ConfigErrorKind::ParseAuth(_) => ErrorClass::Config,
                ConfigErrorKind::Create(e) => class_of_io(e),
            },
            Self::Dial(e) => class_of_io(e),
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Timeout(_) => ErrorClass::Timeout,
        }
    }
}

pub type Result<T, E = AdapterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_carry_address() {
        let err = AdapterError::config("hy.example.com:443", ConfigErrorKind::ParseCa);
        assert_eq!(err.to_string(), "hysteria hy.example.com:443 failed to parse ca");
        assert_eq!(err.class(), ErrorClass::Tls);

        let load = AdapterError::config(
            "[::1]:443",
            TlsError::LoadCa {
                path: "/nope.pem".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert!(load.to_string().starts_with("hysteria [::1]:443 load ca error: /nope.pem"));
    }

    #[test]
    fn dial_error_is_passed_through() {
        let err = AdapterError::Dial(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(err.to_string(), "refused");
        assert_eq!(err.class(), ErrorClass::Io);
    }

    #[test]
    fn create_error_classified_by_kind() {
        let err = AdapterError::config(
            "h:1",
            ConfigErrorKind::Create(io::Error::new(io::ErrorKind::PermissionDenied, "auth")),
        );
        assert_eq!(err.class(), ErrorClass::Auth);
        assert_eq!(err.to_string(), "hysteria h:1 create error: auth");
    }

    #[test]
    fn parse_error_reads_as_speed_format() {
        let err: AdapterError = BandwidthError::InvalidFormat("fast".into()).into();
        assert!(err.to_string().contains("invalid speed format"));
        assert_eq!(err.class(), ErrorClass::Config);
    }
}
