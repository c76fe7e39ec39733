//! Relay streams over the QUIC connection.

use crate::protocol::{encode_client_request, ServerResponse};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// One quinn bidirectional stream as a single `AsyncRead + AsyncWrite`.
#[derive(Debug)]
pub(crate) struct QuicBidiStream {
    send: quinn::SendStream,
    recv: quinn::RecvStream,
}

impl QuicBidiStream {
    pub(crate) fn new(send: quinn::SendStream, recv: quinn::RecvStream) -> Self {
        Self { send, recv }
    }
}

impl AsyncRead for QuicBidiStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        AsyncRead::poll_read(Pin::new(&mut self.recv), cx, buf)
    }
}

impl AsyncWrite for QuicBidiStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        AsyncWrite::poll_write(Pin::new(&mut self.send), cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncWrite::poll_flush(Pin::new(&mut self.send), cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncWrite::poll_shutdown(Pin::new(&mut self.send), cx)
    }
}

/// Open a relay stream to `host:port` and wait for the server to accept it.
pub(crate) async fn open_relay(
    conn: &quinn::Connection,
    host: &str,
    port: u16,
) -> io::Result<QuicBidiStream> {
    let (mut send, mut recv) = conn
        .open_bi()
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionAborted, e))?;

    let request = encode_client_request(false, host, port)?;
    send.write_all(&request).await.map_err(io::Error::from)?;

    let resp = ServerResponse::read_from(&mut recv).await?;
    if !resp.ok {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("hysteria server rejected {host}:{port}: {}", resp.message),
        ));
    }
    tracing::debug!(host, port, "hysteria relay stream established");
    Ok(QuicBidiStream::new(send, recv))
}
