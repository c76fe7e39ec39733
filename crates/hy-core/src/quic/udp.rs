//! UDP sessions carried in QUIC datagrams.
//!
//! Each packet flow owns a control stream for its lifetime; the server assigns
//! a session id on that stream and every datagram is tagged with it. One demux
//! task per connection routes incoming datagrams to the owning flow.

use crate::protocol::{encode_client_request, ServerResponse, UdpMessage};
use crate::session::PacketFlow;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use hy_types::TargetAddr;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Datagrams buffered per flow before the demux task starts dropping.
const FLOW_BACKLOG: usize = 1024;

/// Session id to receive channel, shared between the demux task and flows.
pub(crate) type FlowRegistry = Arc<Mutex<HashMap<u32, mpsc::Sender<UdpMessage>>>>;

/// Route datagrams of `conn` to registered flows until the connection ends.
pub(crate) async fn demux(conn: quinn::Connection, flows: FlowRegistry) {
    loop {
        let raw = match conn.read_datagram().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "hysteria datagram loop finished");
                break;
            }
        };
        let msg = match UdpMessage::decode(raw) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::trace!(error = %e, "dropping malformed udp message");
                continue;
            }
        };
        let tx = flows.lock().get(&msg.session_id).cloned();
        match tx {
            Some(tx) => {
                if tx.try_send(msg).is_err() {
                    tracing::trace!("packet flow backlog full, dropping datagram");
                }
            }
            None => tracing::trace!(session_id = msg.session_id, "datagram for unknown session"),
        }
    }
    // Dropping the senders ends every pending receive.
    flows.lock().clear();
}

/// Reassembles fragmented messages; only one message is tracked at a time.
#[derive(Debug, Default)]
pub(crate) struct Defragger {
    msg_id: u16,
    frags: Vec<Option<UdpMessage>>,
    received: usize,
    size: usize,
}

impl Defragger {
    pub(crate) fn feed(&mut self, msg: UdpMessage) -> Option<UdpMessage> {
        if msg.frag_count <= 1 {
            return Some(msg);
        }
        if msg.frag_id >= msg.frag_count {
            return None;
        }
        let count = usize::from(msg.frag_count);
        if msg.msg_id != self.msg_id || self.frags.len() != count {
            self.msg_id = msg.msg_id;
            self.frags = std::iter::repeat_with(|| None).take(count).collect();
            self.received = 0;
            self.size = 0;
        }
        let slot = &mut self.frags[usize::from(msg.frag_id)];
        if slot.is_none() {
            self.size += msg.data.len();
            self.received += 1;
            *slot = Some(msg);
        }
        if self.received < count {
            return None;
        }

        let mut data = BytesMut::with_capacity(self.size);
        let mut frags = std::mem::take(&mut self.frags).into_iter().flatten();
        let mut first = frags.next()?;
        data.extend_from_slice(&first.data);
        for frag in frags {
            data.extend_from_slice(&frag.data);
        }
        self.received = 0;
        self.size = 0;
        first.frag_id = 0;
        first.frag_count = 1;
        first.data = data.freeze();
        Some(first)
    }
}

struct Inbound {
    rx: mpsc::Receiver<UdpMessage>,
    defrag: Defragger,
}

pub(crate) struct QuicPacketFlow {
    conn: quinn::Connection,
    session_id: u32,
    flows: FlowRegistry,
    control: Mutex<Option<quinn::SendStream>>,
    // Held so the server keeps the session; never read after the response.
    _control_recv: quinn::RecvStream,
    inbound: tokio::sync::Mutex<Inbound>,
    next_msg_id: AtomicU16,
    closed: AtomicBool,
}

impl QuicPacketFlow {
    /// Ask the server for a UDP session and register it with the demux task.
    pub(crate) async fn open(conn: quinn::Connection, flows: FlowRegistry) -> io::Result<Self> {
        let (mut send, mut recv) = conn
            .open_bi()
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionAborted, e))?;
        let request = encode_client_request(true, "", 0)?;
        send.write_all(&request).await.map_err(io::Error::from)?;

        let resp = ServerResponse::read_from(&mut recv).await?;
        if !resp.ok {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("hysteria server refused udp session: {}", resp.message),
            ));
        }

        let (tx, rx) = mpsc::channel(FLOW_BACKLOG);
        flows.lock().insert(resp.udp_session_id, tx);
        tracing::debug!(session_id = resp.udp_session_id, "hysteria udp session opened");

        Ok(Self {
            conn,
            session_id: resp.udp_session_id,
            flows,
            control: Mutex::new(Some(send)),
            _control_recv: recv,
            inbound: tokio::sync::Mutex::new(Inbound {
                rx,
                defrag: Defragger::default(),
            }),
            next_msg_id: AtomicU16::new(rand::random()),
            closed: AtomicBool::new(false),
        })
    }

    fn release(&self) {
        self.flows.lock().remove(&self.session_id);
        if let Some(mut send) = self.control.lock().take() {
            let _ = send.finish();
        }
    }
}

impl fmt::Debug for QuicPacketFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuicPacketFlow")
            .field("session_id", &self.session_id)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl PacketFlow for QuicPacketFlow {
    async fn receive(&self) -> io::Result<(Bytes, String)> {
        let mut inbound = self.inbound.lock().await;
        loop {
            let msg = inbound
                .rx
                .recv()
                .await
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "packet flow closed"))?;
            if let Some(msg) = inbound.defrag.feed(msg) {
                let from = TargetAddr::from_host_port(&msg.host, msg.port).to_string();
                return Ok((msg.data, from));
            }
        }
    }

    async fn send(&self, payload: &[u8], addr: &str) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "packet flow closed"));
        }
        let target: TargetAddr = addr
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let max = self.conn.max_datagram_size().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Unsupported, "peer does not accept datagrams")
        })?;

        let msg = UdpMessage {
            session_id: self.session_id,
            host: target.host(),
            port: target.port(),
            msg_id: 0,
            frag_id: 0,
            frag_count: 1,
            data: Bytes::copy_from_slice(payload),
        };
        let frags = if msg.header_len() + msg.data.len() > max {
            let msg_id = self.next_msg_id.fetch_add(1, Ordering::Relaxed);
            UdpMessage { msg_id, ..msg }.fragment(max)?
        } else {
            vec![msg]
        };
        for frag in frags {
            self.conn
                .send_datagram(frag.encode()?)
                .map_err(io::Error::other)?;
        }
        Ok(())
    }

    async fn close(&self) -> io::Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.release();
            tracing::debug!(session_id = self.session_id, "hysteria udp session closed");
        }
        Ok(())
    }
}

impl Drop for QuicPacketFlow {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.release();
        }
    }
}
