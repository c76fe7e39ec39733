//! Hysteria v1 outbound.
//!
//! [`HysteriaOutbound`] turns a [`ConnectionProfile`] into one live session
//! and serves every stream and packet dial from it until dropped.

mod packet;
mod transport;

pub use packet::HyPacketConn;
pub use transport::build_transport_settings;

use crate::error::ConfigErrorKind;
use crate::outbound::prelude::*;
use crate::traits::span_dial;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hy_config::ConnectionProfile;
use hy_core::{
    brutal_factory, DialerOptions, Obfuscator, QuicConnector, Session, SessionConnector,
    SessionParams, XPlusObfuscator,
};
use hy_tls::{SecurityContext, SecurityContextBuilder};
use hy_types::TargetAddr;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Upper bound for connecting and handshaking with the server.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(8);

const KIND: &str = "hysteria";

pub struct HysteriaOutbound {
    name: String,
    addr: String,
    udp: bool,
    session: Arc<dyn Session>,
    dialer: DialerOptions,
}

impl HysteriaOutbound {
    /// Connect over QUIC.
    pub async fn connect(profile: &ConnectionProfile) -> Result<Self> {
        Self::with_connector(profile, &QuicConnector::new()).await
    }

    /// Build the session through `connector`.
    pub async fn with_connector(
        profile: &ConnectionProfile,
        connector: &dyn SessionConnector,
    ) -> Result<Self> {
        let params = session_params(profile)?;
        let addr = params.addr.clone();
        let dialer = params.dialer.clone();

        tracing::info!(
            name = %profile.name,
            addr = %addr,
            protocol = %params.protocol,
            up_bps = params.up_bps,
            down_bps = params.down_bps,
            obfs = params.obfuscator.is_some(),
            "creating hysteria outbound"
        );

        let session = connector
            .create(params)
            .await
            .map_err(|e| AdapterError::config(&addr, ConfigErrorKind::Create(e)))?;

        Ok(Self {
            name: profile.name.clone(),
            addr,
            udp: profile.udp,
            session,
            dialer,
        })
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub fn dialer(&self) -> &DialerOptions {
        &self.dialer
    }
}

impl fmt::Debug for HysteriaOutbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HysteriaOutbound")
            .field("name", &self.name)
            .field("addr", &self.addr)
            .field("udp", &self.udp)
            .finish_non_exhaustive()
    }
}

/// Resolve everything the session connector needs from `profile`.
pub fn session_params(profile: &ConnectionProfile) -> Result<SessionParams> {
    let addr = profile.address();
    let speed = profile.speed()?;
    let tls = security_context(profile).map_err(|e| AdapterError::config(&addr, e))?;
    let transport = build_transport_settings(profile);
    let auth = decode_auth(profile).map_err(|e| AdapterError::config(&addr, e))?;

    let obfuscator = if profile.obfs.is_empty() {
        None
    } else {
        Some(Arc::new(XPlusObfuscator::new(profile.obfs.as_bytes())) as Arc<dyn Obfuscator>)
    };

    Ok(SessionParams {
        addr,
        protocol: profile.protocol.clone(),
        auth,
        tls,
        transport,
        dialer: DialerOptions {
            interface: profile.interface_name.clone(),
            routing_mark: profile.routing_mark,
        },
        timeout: DIAL_TIMEOUT,
        up_bps: speed.up_bps,
        down_bps: speed.down_bps,
        congestion: brutal_factory(),
        obfuscator,
    })
}

fn security_context(profile: &ConnectionProfile) -> hy_tls::TlsResult<SecurityContext> {
    SecurityContextBuilder::new(profile.sni.as_str())
        .skip_verify(profile.skip_cert_verify)
        .alpn(profile.alpn.clone())
        .ca_file(profile.ca.as_str())
        .ca_pem(profile.ca_str.as_str())
        .build()
}

/// `auth` (base64) when present, even if empty; otherwise the raw `auth_str`.
fn decode_auth(profile: &ConnectionProfile) -> std::result::Result<Vec<u8>, ConfigErrorKind> {
    match &profile.auth {
        Some(encoded) => STANDARD.decode(encoded).map_err(ConfigErrorKind::ParseAuth),
        None => Ok(profile.auth_str.as_bytes().to_vec()),
    }
}

#[async_trait]
impl OutboundAdapter for HysteriaOutbound {
    fn name(&self) -> &str {
        &self.name
    }

    fn addr(&self) -> &str {
        &self.addr
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    fn supports_udp(&self) -> bool {
        self.udp
    }

    async fn open_stream(&self, ctx: &DialContext, target: &TargetAddr) -> Result<ProxyStream> {
        let dest = target.to_string();
        async {
            tracing::debug!("opening hysteria stream");
            let raw = ctx.run(self.session.dial_stream(&dest)).await?;
            Ok::<_, AdapterError>(ProxyStream::new(raw, self.name.clone()))
        }
        .instrument(span_dial(KIND, target, "tcp"))
        .await
    }

    async fn open_packet_flow(&self, ctx: &DialContext) -> Result<ProxyPacketConn> {
        async {
            tracing::debug!("opening hysteria packet flow");
            let flow = ctx.run(self.session.dial_packet_flow()).await?;
            Ok::<_, AdapterError>(ProxyPacketConn::new(
                Box::new(HyPacketConn::new(flow)),
                self.name.clone(),
            ))
        }
        .instrument(span_dial(KIND, &self.addr, "udp"))
        .await
    }
}
