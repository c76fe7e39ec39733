//! Hysteria v1 wire messages.
//!
//! All integers are big-endian; strings and byte blobs carry a `u16` length
//! prefix. The control stream starts with a single version byte followed by
//! the client hello.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const PROTOCOL_VERSION: u8 = 3;

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn put_str16(buf: &mut BytesMut, s: &[u8]) -> io::Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "field longer than 65535 bytes"))?;
    buf.put_u16(len);
    buf.put_slice(s);
    Ok(())
}

async fn read_str16<R: AsyncRead + Unpin>(r: &mut R) -> io::Result<String> {
    let len = r.read_u16().await? as usize;
    let mut raw = vec![0u8; len];
    r.read_exact(&mut raw).await?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Version byte + client hello: rates and auth.
pub fn encode_client_hello(send_bps: u64, recv_bps: u64, auth: &[u8]) -> io::Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(1 + 16 + 2 + auth.len());
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_u64(send_bps);
    buf.put_u64(recv_bps);
    put_str16(&mut buf, auth)?;
    Ok(buf)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub ok: bool,
    pub send_bps: u64,
    pub recv_bps: u64,
    pub message: String,
}

impl ServerHello {
    pub async fn read_from<R: AsyncRead + Unpin>(r: &mut R) -> io::Result<Self> {
        let ok = r.read_u8().await? != 0;
        let send_bps = r.read_u64().await?;
        let recv_bps = r.read_u64().await?;
        let message = read_str16(r).await?;
        Ok(Self {
            ok,
            send_bps,
            recv_bps,
            message,
        })
    }
}

/// Request opening a TCP relay (`udp = false`) or a UDP session.
pub fn encode_client_request(udp: bool, host: &str, port: u16) -> io::Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(1 + 2 + host.len() + 2);
    buf.put_u8(u8::from(udp));
    put_str16(&mut buf, host.as_bytes())?;
    buf.put_u16(port);
    Ok(buf)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResponse {
    pub ok: bool,
    pub udp_session_id: u32,
    pub message: String,
}

impl ServerResponse {
    pub async fn read_from<R: AsyncRead + Unpin>(r: &mut R) -> io::Result<Self> {
        let ok = r.read_u8().await? != 0;
        let udp_session_id = r.read_u32().await?;
        let message = read_str16(r).await?;
        Ok(Self {
            ok,
            udp_session_id,
            message,
        })
    }
}

/// One (possibly fragmented) UDP datagram carried in a QUIC datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpMessage {
    pub session_id: u32,
    pub host: String,
    pub port: u16,
    pub msg_id: u16,
    pub frag_id: u8,
    pub frag_count: u8,
    pub data: Bytes,
}

impl UdpMessage {
    /// Encoded size without the payload.
    pub fn header_len(&self) -> usize {
        4 + 2 + self.host.len() + 2 + 2 + 1 + 1 + 2
    }

    pub fn encode(&self) -> io::Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.header_len() + self.data.len());
        buf.put_u32(self.session_id);
        put_str16(&mut buf, self.host.as_bytes())?;
        buf.put_u16(self.port);
        buf.put_u16(self.msg_id);
        buf.put_u8(self.frag_id);
        buf.put_u8(self.frag_count);
        put_str16(&mut buf, &self.data)?;
        Ok(buf.freeze())
    }

    pub fn decode(mut raw: Bytes) -> io::Result<Self> {
        if raw.remaining() < 6 {
            return Err(invalid("udp message too short"));
        }
        let session_id = raw.get_u32();
        let host_len = raw.get_u16() as usize;
        if raw.remaining() < host_len + 8 {
            return Err(invalid("udp message truncated in header"));
        }
        let host = String::from_utf8_lossy(&raw.split_to(host_len)).into_owned();
        let port = raw.get_u16();
        let msg_id = raw.get_u16();
        let frag_id = raw.get_u8();
        let frag_count = raw.get_u8();
        let data_len = raw.get_u16() as usize;
        if raw.remaining() < data_len {
            return Err(invalid("udp message truncated in payload"));
        }
        let data = raw.split_to(data_len);
        Ok(Self {
            session_id,
            host,
            port,
            msg_id,
            frag_id,
            frag_count,
            data,
        })
    }

    /// Split into fragments whose encoded size fits `max_size`.
    ///
    /// Returns the message unchanged when it already fits.
    pub fn fragment(self, max_size: usize) -> io::Result<Vec<UdpMessage>> {
        let header = self.header_len();
        if header + self.data.len() <= max_size {
            return Ok(vec![self]);
        }
        let chunk = max_size
            .checked_sub(header)
            .filter(|c| *c > 0)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "datagram too small for header"))?;
        let count = self.data.len().div_ceil(chunk);
        let frag_count = u8::try_from(count)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload needs more than 255 fragments"))?;
        Ok(self
            .data
            .chunks(chunk)
            .enumerate()
            .map(|(i, part)| UdpMessage {
                session_id: self.session_id,
                host: self.host.clone(),
                port: self.port,
                msg_id: self.msg_id,
                frag_id: i as u8,
                frag_count,
                data: self.data.slice_ref(part),
            })
            .collect())
    }
}
