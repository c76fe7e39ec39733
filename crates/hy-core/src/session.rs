//! Session-layer contracts consumed by the outbound adapter.
//!
//! A [`SessionConnector`] is the construction primitive: given the resolved
//! [`SessionParams`] it yields one [`Session`] that owns the multiplexed secure
//! connection. Streams and packet flows are then opened against that session
//! for as long as it lives.

use crate::congestion::CongestionFactory;
use crate::obfs::Obfuscator;
use crate::transport::TransportSettings;
use async_trait::async_trait;
use bytes::Bytes;
use hy_tls::SecurityContext;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Combined trait for async read + write + unpin + send.
pub trait AsyncStream: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {}

/// Boxed async stream returned by [`Session::dial_stream`].
pub type BoxedStream = Box<dyn AsyncStream>;

/// Socket-level options for the session's UDP socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialerOptions {
    /// Bind the socket to this network device.
    pub interface: Option<String>,
    /// Packet mark for policy routing.
    pub routing_mark: Option<u32>,
}

/// Everything the construction primitive needs.
#[derive(Clone)]
pub struct SessionParams {
    /// Server `host:port`.
    pub addr: String,
    /// Transport protocol tag; empty means plain UDP.
    pub protocol: String,
    pub auth: Vec<u8>,
    pub tls: SecurityContext,
    pub transport: TransportSettings,
    pub dialer: DialerOptions,
    /// Upper bound for connect + handshake.
    pub timeout: Duration,
    pub up_bps: u64,
    pub down_bps: u64,
    /// Builds the congestion controller for a reference rate.
    pub congestion: CongestionFactory,
    pub obfuscator: Option<Arc<dyn Obfuscator>>,
}

impl fmt::Debug for SessionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionParams")
            .field("addr", &self.addr)
            .field("protocol", &self.protocol)
            .field("auth_len", &self.auth.len())
            .field("tls", &self.tls)
            .field("transport", &self.transport)
            .field("dialer", &self.dialer)
            .field("timeout", &self.timeout)
            .field("up_bps", &self.up_bps)
            .field("down_bps", &self.down_bps)
            .field("obfs", &self.obfuscator.is_some())
            .finish()
    }
}

/// Addressed-datagram channel scoped to one session.
///
/// Addresses are `host:port` strings on this side of the boundary.
#[async_trait]
pub trait PacketFlow: Send + Sync + fmt::Debug {
    /// Receive one datagram and the address it came from.
    async fn receive(&self) -> io::Result<(Bytes, String)>;

    /// Send one datagram to `addr`.
    async fn send(&self, payload: &[u8], addr: &str) -> io::Result<()>;

    /// Release the flow. Default implementation does nothing.
    async fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// One established multiplexed session.
///
/// Implementations must allow concurrent stream/flow creation.
#[async_trait]
pub trait Session: Send + Sync + fmt::Debug {
    /// Open a new reliable stream to `target` (`host:port`).
    async fn dial_stream(&self, target: &str) -> io::Result<BoxedStream>;

    /// Open a new packet flow; the destination is chosen per send.
    async fn dial_packet_flow(&self) -> io::Result<Box<dyn PacketFlow>>;
}

/// Construction primitive for sessions.
#[async_trait]
pub trait SessionConnector: Send + Sync + fmt::Debug {
    async fn create(&self, params: SessionParams) -> io::Result<Arc<dyn Session>>;
}
