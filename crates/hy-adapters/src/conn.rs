//! Generic connection capabilities handed to the routing layer.

use crate::traits::PacketConn;
use async_trait::async_trait;
use hy_core::BoxedStream;
use hy_types::TargetAddr;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Stream connection tagged with the chain of adapters it went through.
pub struct ProxyStream {
    inner: BoxedStream,
    chain: Vec<String>,
}

impl ProxyStream {
    pub fn new(inner: BoxedStream, adapter: impl Into<String>) -> Self {
        Self {
            inner,
            chain: vec![adapter.into()],
        }
    }

    pub fn adapter_chain(&self) -> &[String] {
        &self.chain
    }

    pub fn append_to_chain(&mut self, adapter: impl Into<String>) {
        self.chain.push(adapter.into());
    }

    pub fn into_inner(self) -> BoxedStream {
        self.inner
    }
}

impl fmt::Debug for ProxyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyStream").field("chain", &self.chain).finish()
    }
}

impl AsyncRead for ProxyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for ProxyStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Packet connection tagged with its adapter chain.
#[derive(Debug)]
pub struct ProxyPacketConn {
    inner: Box<dyn PacketConn>,
    chain: Vec<String>,
}

impl ProxyPacketConn {
    pub fn new(inner: Box<dyn PacketConn>, adapter: impl Into<String>) -> Self {
        Self {
            inner,
            chain: vec![adapter.into()],
        }
    }

    pub fn adapter_chain(&self) -> &[String] {
        &self.chain
    }

    pub fn append_to_chain(&mut self, adapter: impl Into<String>) {
        self.chain.push(adapter.into());
    }
}

#[async_trait]
impl PacketConn for ProxyPacketConn {
    async fn read_from(&self, buf: &mut [u8]) -> io::Result<(usize, TargetAddr)> {
        self.inner.read_from(buf).await
    }

    async fn write_to(&self, buf: &[u8], addr: &TargetAddr) -> io::Result<usize> {
        self.inner.write_to(buf, addr).await
    }

    async fn close(&self) -> io::Result<()> {
        self.inner.close().await
    }
}
