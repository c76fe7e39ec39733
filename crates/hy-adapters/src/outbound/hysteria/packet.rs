//! Bridges a session [`PacketFlow`] to [`PacketConn`].
//!
//! `read_from` copies at most `buf.len()` bytes and silently drops the rest of
//! a larger datagram, so callers must pass a buffer at least as large as the
//! biggest datagram they expect. `write_to` reports the whole buffer as
//! written once the flow accepts it; datagrams carry no delivery guarantee.
//! A source address that does not parse is reported as a port-0 domain.

use crate::outbound::prelude::*;
use hy_core::PacketFlow;
use hy_types::TargetAddr;
use std::io;
use tracing::trace;

#[derive(Debug)]
pub struct HyPacketConn {
    flow: Box<dyn PacketFlow>,
}

impl HyPacketConn {
    pub fn new(flow: Box<dyn PacketFlow>) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl PacketConn for HyPacketConn {
    async fn read_from(&self, buf: &mut [u8]) -> io::Result<(usize, TargetAddr)> {
        let (payload, from) = self.flow.receive().await?;
        let addr = source_addr(from);
        let n = payload.len().min(buf.len());
        buf[..n].copy_from_slice(&payload[..n]);
        Ok((n, addr))
    }

    async fn write_to(&self, buf: &[u8], addr: &TargetAddr) -> io::Result<usize> {
        self.flow.send(buf, &addr.to_string()).await?;
        Ok(buf.len())
    }

    async fn close(&self) -> io::Result<()> {
        self.flow.close().await
    }
}

fn source_addr(from: String) -> TargetAddr {
    match from.parse::<TargetAddr>() {
        Ok(addr) => addr,
        Err(e) => {
            trace!(source = %from, error = %e, "unparsable datagram source");
            TargetAddr::Domain(from, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[derive(Debug)]
    struct OneShot(&'static str);

    #[async_trait]
    impl PacketFlow for OneShot {
        async fn receive(&self) -> io::Result<(Bytes, String)> {
            Ok((Bytes::from_static(b"ping"), self.0.to_string()))
        }

        async fn send(&self, _payload: &[u8], _addr: &str) -> io::Result<()> {
            Ok(())
        }

        async fn close(&self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn datagram_survives_unparsable_source() {
        let conn = HyPacketConn::new(Box::new(OneShot("relay-without-port")));
        let mut buf = [0u8; 16];
        let (n, from) = conn.read_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, TargetAddr::domain("relay-without-port", 0));
    }

    #[tokio::test]
    async fn scoped_source_keeps_brackets() {
        let conn = HyPacketConn::new(Box::new(OneShot("[fe80::1%eth0]:53")));
        let mut buf = [0u8; 16];
        let (_, from) = conn.read_from(&mut buf).await.unwrap();
        assert_eq!(from.to_string(), "[fe80::1%eth0]:53");
    }
}
