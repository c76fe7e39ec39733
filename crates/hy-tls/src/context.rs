//! Security context for the outbound session.
//!
//! Rules applied by [`SecurityContextBuilder::build`]:
//! 1. server name is the SNI verbatim (empty means "use the server host");
//! 2. skip-verify is copied verbatim;
//! 3. only TLS 1.3 is offered;
//! 4. ALPN is the profile list, or [`DEFAULT_ALPN`] when empty;
//! 5. trust roots come from the CA file when set, else the inline PEM when
//!    set, else the bundled web PKI roots. A CA file that cannot be read or
//!    parsed is an error and never falls back to the inline PEM.

use crate::danger::NoVerify;
use crate::{crypto_provider, TlsError, TlsResult, DEFAULT_ALPN};
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};
use std::sync::Arc;

/// Only protocol version offered; there is no downgrade path.
pub static PROTOCOL_VERSIONS: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Trust-root source.
#[derive(Debug, Clone)]
pub enum TrustRoots {
    /// Bundled web PKI roots.
    System,
    /// A pool built from exactly one user CA source.
    Custom(Arc<RootCertStore>),
}

/// Resolved TLS parameters for the session.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    pub server_name: String,
    pub skip_verify: bool,
    pub alpn: Vec<String>,
    pub roots: TrustRoots,
}

impl SecurityContext {
    /// Build the rustls client configuration.
    pub fn client_config(&self) -> TlsResult<ClientConfig> {
        let provider = crypto_provider();
        let roots = match &self.roots {
            TrustRoots::System => Arc::new(system_root_store()),
            TrustRoots::Custom(store) => Arc::clone(store),
        };

        let mut cfg = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(PROTOCOL_VERSIONS)
            .map_err(|e| TlsError::Config(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        cfg.alpn_protocols = self.alpn.iter().map(|p| p.as_bytes().to_vec()).collect();

        if self.skip_verify {
            cfg.dangerous()
                .set_certificate_verifier(Arc::new(NoVerify::new(provider)));
        }
        Ok(cfg)
    }

    /// Name to verify against: the SNI, or `host` when the SNI is empty.
    pub fn effective_server_name<'a>(&'a self, host: &'a str) -> &'a str {
        if self.server_name.is_empty() {
            host
        } else {
            &self.server_name
        }
    }

    pub fn has_custom_roots(&self) -> bool {
        matches!(self.roots, TrustRoots::Custom(_))
    }
}

/// Builder over the profile's TLS options.
#[derive(Debug, Default, Clone)]
pub struct SecurityContextBuilder {
    server_name: String,
    skip_verify: bool,
    alpn: Vec<String>,
    ca_file: String,
    ca_pem: String,
}

impl SecurityContextBuilder {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            ..Default::default()
        }
    }

    pub fn skip_verify(mut self, skip: bool) -> Self {
        self.skip_verify = skip;
        self
    }

    pub fn alpn(mut self, alpn: Vec<String>) -> Self {
        self.alpn = alpn;
        self
    }

    pub fn ca_file(mut self, path: impl Into<String>) -> Self {
        self.ca_file = path.into();
        self
    }

    pub fn ca_pem(mut self, pem: impl Into<String>) -> Self {
        self.ca_pem = pem.into();
        self
    }

    pub fn build(self) -> TlsResult<SecurityContext> {
        let alpn = if self.alpn.is_empty() {
            vec![DEFAULT_ALPN.to_string()]
        } else {
            self.alpn
        };

        let roots = if !self.ca_file.is_empty() {
            let bytes = std::fs::read(&self.ca_file).map_err(|source| TlsError::LoadCa {
                path: self.ca_file.clone(),
                source,
            })?;
            TrustRoots::Custom(Arc::new(parse_pem_roots(&bytes)?))
        } else if !self.ca_pem.is_empty() {
            TrustRoots::Custom(Arc::new(parse_pem_roots(self.ca_pem.as_bytes())?))
        } else {
            TrustRoots::System
        };

        Ok(SecurityContext {
            server_name: self.server_name,
            skip_verify: self.skip_verify,
            alpn,
            roots,
        })
    }
}

/// Parse PEM certificates into a new pool; zero usable certificates is an error.
pub fn parse_pem_roots(pem: &[u8]) -> TlsResult<RootCertStore> {
    let mut store = RootCertStore::empty();
    let mut rd = pem;
    let certs = rustls_pemfile::certs(&mut rd).filter_map(Result::ok);
    let (added, ignored) = store.add_parsable_certificates(certs);
    if ignored > 0 {
        tracing::debug!(added, ignored, "skipped unparsable CA certificates");
    }
    if added == 0 {
        return Err(TlsError::ParseCa);
    }
    Ok(store)
}

/// Root store from the bundled web PKI roots.
pub fn system_root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}
