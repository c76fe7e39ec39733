//! Interfaces the routing layer sees.
//!
//! - [`OutboundAdapter`]: one configured outbound, dialling streams and packet flows
//! - [`PacketConn`]: addressed datagram connection over [`TargetAddr`]
//! - [`DialContext`]: caller-owned cancellation and deadline for a dial

use crate::conn::{ProxyPacketConn, ProxyStream};
use crate::error::{AdapterError, Result};
use async_trait::async_trait;
use hy_types::TargetAddr;
use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation signal and optional deadline for one dial.
#[derive(Debug, Clone, Default)]
pub struct DialContext {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl DialContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancel(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some((Instant::now() + timeout, timeout));
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` until it completes, the token fires or the deadline passes.
    ///
    /// A failure of `fut` itself comes back as [`AdapterError::Dial`] unchanged.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        let expiry = async {
            match self.deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AdapterError::Cancelled),
            _ = expiry => Err(AdapterError::Timeout(
                self.deadline.map(|(_, d)| d).unwrap_or_default(),
            )),
            res = fut => res.map_err(AdapterError::Dial),
        }
    }
}

/// Datagram connection where the peer is chosen per packet.
#[async_trait]
pub trait PacketConn: Send + Sync + Debug {
    /// Read one datagram into `buf`, returning the bytes copied and the sender.
    async fn read_from(&self, buf: &mut [u8]) -> io::Result<(usize, TargetAddr)>;

    /// Send `buf` as one datagram to `addr`.
    async fn write_to(&self, buf: &[u8], addr: &TargetAddr) -> io::Result<usize>;

    async fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// A configured outbound proxy.
#[async_trait]
pub trait OutboundAdapter: Send + Sync + Debug {
    /// Name from the profile.
    fn name(&self) -> &str;

    /// Server `host:port`.
    fn addr(&self) -> &str;

    /// Adapter type, for logs.
    fn kind(&self) -> &'static str;

    /// Whether the routing layer may send UDP through this adapter.
    fn supports_udp(&self) -> bool;

    async fn open_stream(&self, ctx: &DialContext, target: &TargetAddr) -> Result<ProxyStream>;

    async fn open_packet_flow(&self, ctx: &DialContext) -> Result<ProxyPacketConn>;
}

pub(crate) fn span_dial(adapter: &'static str, dest: &dyn std::fmt::Display, network: &'static str) -> tracing::Span {
    tracing::info_span!("dial", adapter, dest = %dest, network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_runs_to_completion() {
        let out = DialContext::background().run(async { Ok(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn failure_is_reported_as_dial() {
        let err = DialContext::background()
            .run(async { Err::<(), _>(io::Error::from(io::ErrorKind::ConnectionReset)) })
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Dial(e) if e.kind() == io::ErrorKind::ConnectionReset));
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_dial() {
        let token = CancellationToken::new();
        let ctx = DialContext::with_cancel(token.clone());
        token.cancel();
        let err = ctx
            .run(std::future::pending::<io::Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = DialContext::background().with_timeout(Duration::from_secs(3));
        let err = ctx
            .run(std::future::pending::<io::Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Timeout(d) if d == Duration::from_secs(3)));
    }
}
