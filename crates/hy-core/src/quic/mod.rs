//! QUIC-backed hysteria v1 client.
//!
//! [`QuicConnector`] dials the server, runs the control-stream handshake and
//! hands back a session that multiplexes relay streams and UDP sessions over
//! the one connection.

mod congestion;
mod socket;
mod stream;
mod udp;

use crate::protocol::{encode_client_hello, ServerHello};
use crate::session::{BoxedStream, PacketFlow, Session, SessionConnector, SessionParams};
use async_trait::async_trait;
use congestion::{BridgeFactory, RateCell};
use hy_types::TargetAddr;
use quinn::crypto::rustls::QuicClientConfig;
use quinn::{Endpoint, EndpointConfig, VarInt};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use udp::{FlowRegistry, QuicPacketFlow};

/// Connects hysteria v1 sessions over QUIC.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuicConnector;

impl QuicConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionConnector for QuicConnector {
    async fn create(&self, params: SessionParams) -> io::Result<Arc<dyn Session>> {
        let deadline = params.timeout;
        let session = tokio::time::timeout(deadline, connect(params))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "hysteria connect timed out"))??;
        Ok(Arc::new(session))
    }
}

fn invalid_input<E>(e: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidInput, e)
}

async fn connect(params: SessionParams) -> io::Result<QuicSession> {
    match params.protocol.as_str() {
        "" | "udp" => {}
        other => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("hysteria protocol {other:?} is not supported"),
            ))
        }
    }

    let server: TargetAddr = params.addr.parse().map_err(invalid_input)?;
    let host = server.host();
    let remote = tokio::net::lookup_host((host.as_str(), server.port()))
        .await?
        .next()
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", params.addr))
        })?;

    let runtime = quinn::default_runtime()
        .ok_or_else(|| io::Error::other("no async runtime available for quic"))?;
    let mut socket = runtime.wrap_udp_socket(socket::bind_udp(remote, &params.dialer)?)?;
    if let Some(obfs) = params.obfuscator.clone() {
        socket = Arc::new(socket::ObfsUdpSocket::new(socket, obfs));
    }
    let endpoint =
        Endpoint::new_with_abstract_socket(EndpointConfig::default(), None, socket, runtime)?;

    let rate: RateCell = Arc::new(AtomicU64::new(params.up_bps));
    let cc = Arc::new(BridgeFactory::new(params.congestion.clone(), rate.clone()));
    let tls = params.tls.client_config().map_err(invalid_input)?;
    let crypto = QuicClientConfig::try_from(tls).map_err(invalid_input)?;
    let mut client = quinn::ClientConfig::new(Arc::new(crypto));
    client.transport_config(Arc::new(params.transport.quinn_config(cc)));

    let server_name = params.tls.effective_server_name(&host);
    tracing::debug!(%remote, server_name, "hysteria: dialing quic");
    let conn = endpoint
        .connect_with(client, remote, server_name)
        .map_err(invalid_input)?
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;

    if let Err(e) = handshake(&conn, &params, &rate).await {
        conn.close(VarInt::from_u32(0), b"");
        return Err(e);
    }

    let flows = FlowRegistry::default();
    let demux = tokio::spawn(udp::demux(conn.clone(), flows.clone()));
    Ok(QuicSession {
        _endpoint: endpoint,
        conn,
        flows,
        rate,
        demux,
    })
}

/// Exchange hellos on the control stream and apply the negotiated send rate.
async fn handshake(conn: &quinn::Connection, params: &SessionParams, rate: &RateCell) -> io::Result<()> {
    let (mut send, mut recv) = conn
        .open_bi()
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionAborted, e))?;
    let hello = encode_client_hello(params.up_bps, params.down_bps, &params.auth)?;
    send.write_all(&hello).await.map_err(io::Error::from)?;

    let reply = ServerHello::read_from(&mut recv).await?;
    let _ = send.finish();
    if !reply.ok {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("hysteria auth error: {}", reply.message),
        ));
    }
    if reply.recv_bps > 0 {
        rate.store(reply.recv_bps, Ordering::Relaxed);
    }
    tracing::debug!(
        send_bps = reply.recv_bps,
        recv_bps = reply.send_bps,
        "hysteria handshake complete"
    );
    Ok(())
}

#[derive(Debug)]
struct QuicSession {
    _endpoint: Endpoint,
    conn: quinn::Connection,
    flows: FlowRegistry,
    rate: RateCell,
    demux: JoinHandle<()>,
}

#[async_trait]
impl Session for QuicSession {
    async fn dial_stream(&self, target: &str) -> io::Result<BoxedStream> {
        let target: TargetAddr = target.parse().map_err(invalid_input)?;
        let stream = stream::open_relay(&self.conn, &target.host(), target.port()).await?;
        Ok(Box::new(stream))
    }

    async fn dial_packet_flow(&self) -> io::Result<Box<dyn PacketFlow>> {
        let flow = QuicPacketFlow::open(self.conn.clone(), self.flows.clone()).await?;
        Ok(Box::new(flow))
    }
}

impl Drop for QuicSession {
    fn drop(&mut self) {
        self.demux.abort();
        self.conn.close(VarInt::from_u32(0), b"");
        tracing::debug!(
            send_bps = self.rate.load(Ordering::Relaxed),
            "hysteria session closed"
        );
    }
}
