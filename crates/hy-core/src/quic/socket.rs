//! UDP socket setup for the QUIC endpoint.

use crate::obfs::Obfuscator;
use crate::session::DialerOptions;
use parking_lot::Mutex;
use quinn::udp::{RecvMeta, Transmit};
use quinn::{AsyncUdpSocket, UdpPoller};
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::io::{self, IoSliceMut};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Bind an unconnected, non-blocking UDP socket suitable for reaching `remote`.
pub(crate) fn bind_udp(remote: SocketAddr, opts: &DialerOptions) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(remote), Type::DGRAM, Some(Protocol::UDP))?;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if let Some(iface) = opts.interface.as_deref() {
            socket.bind_device(Some(iface.as_bytes()))?;
        }
        if let Some(mark) = opts.routing_mark {
            socket.set_mark(mark)?;
        }
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    if opts.interface.is_some() || opts.routing_mark.is_some() {
        tracing::warn!("interface binding and routing mark are ignored on this platform");
    }

    let local: SocketAddr = if remote.is_ipv6() {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    };
    socket.bind(&local.into())?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Applies an [`Obfuscator`] to every datagram crossing the wrapped socket.
pub(crate) struct ObfsUdpSocket {
    inner: Arc<dyn AsyncUdpSocket>,
    obfs: Arc<dyn Obfuscator>,
    send_buf: Mutex<Vec<u8>>,
    recv_buf: Mutex<Vec<u8>>,
}

impl ObfsUdpSocket {
    pub(crate) fn new(inner: Arc<dyn AsyncUdpSocket>, obfs: Arc<dyn Obfuscator>) -> Self {
        Self {
            inner,
            obfs,
            send_buf: Mutex::new(Vec::new()),
            recv_buf: Mutex::new(Vec::new()),
        }
    }

    /// Deobfuscate each `stride`-sized segment of `data` in place.
    ///
    /// Returns the new total length and stride, or `None` if any segment is
    /// not a valid obfuscated packet.
    fn decode_segments(&self, data: &mut [u8], stride: usize) -> Option<(usize, usize)> {
        let overhead = self.obfs.overhead();
        if stride <= overhead {
            return None;
        }
        let mut scratch = self.recv_buf.lock();
        scratch.resize(stride, 0);
        let mut written = 0;
        let mut read = 0;
        while read < data.len() {
            let end = (read + stride).min(data.len());
            let n = self.obfs.deobfuscate(&data[read..end], &mut scratch[..]);
            if n == 0 {
                return None;
            }
            data[written..written + n].copy_from_slice(&scratch[..n]);
            written += n;
            read = end;
        }
        Some((written, stride - overhead))
    }
}

impl fmt::Debug for ObfsUdpSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObfsUdpSocket")
            .field("inner", &self.inner)
            .field("obfs", &self.obfs)
            .finish()
    }
}

impl AsyncUdpSocket for ObfsUdpSocket {
    fn create_io_poller(self: Arc<Self>) -> Pin<Box<dyn UdpPoller>> {
        self.inner.clone().create_io_poller()
    }

    fn try_send(&self, transmit: &Transmit) -> io::Result<()> {
        let overhead = self.obfs.overhead();
        let segment = transmit
            .segment_size
            .unwrap_or(transmit.contents.len())
            .max(1);
        let segments = transmit.contents.len().div_ceil(segment);

        let mut buf = self.send_buf.lock();
        buf.resize(transmit.contents.len() + segments * overhead, 0);
        let mut written = 0;
        for chunk in transmit.contents.chunks(segment) {
            let n = self.obfs.obfuscate(chunk, &mut buf[written..]);
            if n == 0 {
                return Err(io::Error::other("obfuscation buffer too small"));
            }
            written += n;
        }

        self.inner.try_send(&Transmit {
            destination: transmit.destination,
            ecn: transmit.ecn,
            contents: &buf[..written],
            segment_size: transmit.segment_size.map(|s| s + overhead),
            src_ip: transmit.src_ip,
        })
    }

    fn poll_recv(
        &self,
        cx: &mut Context<'_>,
        bufs: &mut [IoSliceMut<'_>],
        meta: &mut [RecvMeta],
    ) -> Poll<io::Result<usize>> {
        let count = match self.inner.poll_recv(cx, bufs, meta) {
            Poll::Ready(Ok(n)) => n,
            other => return other,
        };
        for (buf, m) in bufs.iter_mut().zip(meta.iter_mut()).take(count) {
            let stride = if m.stride == 0 { m.len } else { m.stride };
            match self.decode_segments(&mut buf[..m.len], stride) {
                Some((len, stride)) => {
                    m.len = len;
                    m.stride = stride;
                }
                None => {
                    tracing::trace!(from = %m.addr, "dropping undecodable datagram");
                    m.len = 0;
                }
            }
        }
        Poll::Ready(Ok(count))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn max_transmit_segments(&self) -> usize {
        self.inner.max_transmit_segments()
    }

    fn max_receive_segments(&self) -> usize {
        self.inner.max_receive_segments()
    }

    fn may_fragment(&self) -> bool {
        self.inner.may_fragment()
    }
}
