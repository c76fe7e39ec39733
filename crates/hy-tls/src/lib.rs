//! # hy-tls: TLS trust context for the hysteria outbound
//!
//! - [`SecurityContextBuilder`]: turns profile TLS options (SNI, skip-verify,
//!   ALPN, custom CA file or inline PEM) into a [`SecurityContext`]
//! - [`SecurityContext::client_config`]: materialises a rustls `ClientConfig`
//!   pinned to TLS 1.3
//! - [`danger::NoVerify`]: verifier used when verification is skipped

use std::io;
use std::sync::Arc;

pub mod context;
pub mod danger;

pub use context::{SecurityContext, SecurityContextBuilder, TrustRoots};

/// ALPN identifier used when the profile does not supply one.
pub const DEFAULT_ALPN: &str = "hysteria";

/// Crypto provider for every config this crate builds. Process-level defaults
/// are never consulted.
pub fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// TLS error types
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("load ca error: {path}: {source}")]
    LoadCa {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse ca")]
    ParseCa,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type TlsResult<T> = Result<T, TlsError>;
