#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use bytes::Bytes;
use hy_adapters::{
    AdapterError, ConfigErrorKind, DialContext, HysteriaOutbound, OutboundAdapter, PacketConn,
};
use hy_config::ConnectionProfile;
use hy_core::{BoxedStream, PacketFlow, Session, SessionConnector, SessionParams};
use hy_types::TargetAddr;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records the params it was given and hands out an in-memory session.
#[derive(Debug, Default)]
struct MockConnector {
    seen: Mutex<Option<SessionParams>>,
    fail_with: Option<io::ErrorKind>,
}

impl MockConnector {
    fn failing(kind: io::ErrorKind) -> Self {
        Self {
            fail_with: Some(kind),
            ..Default::default()
        }
    }

    fn params(&self) -> Option<SessionParams> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn create(&self, params: SessionParams) -> io::Result<Arc<dyn Session>> {
        if let Some(kind) = self.fail_with {
            return Err(io::Error::new(kind, "mock server unreachable"));
        }
        *self.seen.lock().unwrap() = Some(params);
        Ok(Arc::new(MockSession::default()))
    }
}

/// Streams echo; `stall.test` never answers; `refused.test` is rejected.
#[derive(Debug, Default)]
struct MockSession {
    flows_opened: AtomicUsize,
}

#[async_trait]
impl Session for MockSession {
    async fn dial_stream(&self, target: &str) -> io::Result<BoxedStream> {
        match target.parse::<TargetAddr>().map(|t| t.host()) {
            Ok(host) if host == "stall.test" => std::future::pending().await,
            Ok(host) if host == "refused.test" => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "server refused stream",
            )),
            _ => {
                let (client, server) = tokio::io::duplex(1024);
                tokio::spawn(async move {
                    let (mut r, mut w) = tokio::io::split(server);
                    let _ = tokio::io::copy(&mut r, &mut w).await;
                });
                Ok(Box::new(client) as BoxedStream)
            }
        }
    }

    async fn dial_packet_flow(&self) -> io::Result<Box<dyn PacketFlow>> {
        let id = self.flows_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(EchoFlow::new(id)))
    }
}

/// Reflects every datagram back from the address it was sent to.
#[derive(Debug)]
struct EchoFlow {
    id: usize,
    tx: mpsc::UnboundedSender<(Bytes, String)>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Bytes, String)>>,
}

impl EchoFlow {
    fn new(id: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id,
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }
}

#[async_trait]
impl PacketFlow for EchoFlow {
    async fn receive(&self) -> io::Result<(Bytes, String)> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }

    async fn send(&self, payload: &[u8], addr: &str) -> io::Result<()> {
        if addr.starts_with("0.0.0.0:") {
            return Err(io::Error::new(io::ErrorKind::AddrNotAvailable, "unroutable"));
        }
        let mut tagged = payload.to_vec();
        tagged.push(self.id as u8);
        self.tx
            .send((Bytes::from(tagged), addr.to_string()))
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

fn profile() -> ConnectionProfile {
    ConnectionProfile {
        name: "hy-test".into(),
        server: "hy.example.com".into(),
        port: 8443,
        udp: true,
        ..Default::default()
    }
}

async fn outbound() -> HysteriaOutbound {
    HysteriaOutbound::with_connector(&profile(), &MockConnector::default())
        .await
        .unwrap()
}

fn ca_pem() -> String {
    rcgen::generate_simple_self_signed(vec!["hy.example.com".to_string()])
        .unwrap()
        .cert
        .pem()
}

#[tokio::test]
async fn profile_from_json_reaches_connector() -> anyhow::Result<()> {
    init_tracing();
    let json = serde_json::json!({
        "name": "hy-json",
        "server": "203.0.113.9",
        "port": 443,
        "protocol": "udp",
        "up": "10 MBps",
        "down_mbps": 100,
        "auth_str": "pw",
        "obfs": "salt",
        "sni": "cdn.example.com",
        "skip-cert-verify": true,
        "alpn": ["h3"],
        "recv_window_conn": 1048576,
        "udp": true
    });
    let profile = ConnectionProfile::from_json_str(&json.to_string())?;
    let connector = MockConnector::default();
    let out = HysteriaOutbound::with_connector(&profile, &connector).await?;

    assert_eq!(out.addr(), "203.0.113.9:443");
    assert_eq!(out.kind(), "hysteria");
    assert!(out.supports_udp());

    let params = connector.params().expect("connector invoked");
    assert_eq!(params.protocol, "udp");
    assert_eq!(params.auth, b"pw");
    assert_eq!(params.up_bps, 10 << 20);
    assert_eq!(params.down_bps, 100 * 125_000);
    assert_eq!(params.timeout, Duration::from_secs(8));
    assert_eq!(params.tls.server_name, "cdn.example.com");
    assert!(params.tls.skip_verify);
    assert_eq!(params.tls.alpn, vec!["h3".to_string()]);
    assert!(!params.tls.has_custom_roots());
    assert_eq!(params.transport.initial_connection_receive_window, 1 << 20);
    assert_eq!(params.transport.max_connection_receive_window, 1 << 20);
    assert_eq!(params.transport.max_stream_receive_window, 15 << 20);
    assert!(params.obfuscator.is_some());
    Ok(())
}

#[tokio::test]
async fn invalid_ca_file_does_not_fall_back_to_inline_pem() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"this is not a certificate").unwrap();

    let p = ConnectionProfile {
        ca: file.path().to_string_lossy().into_owned(),
        ca_str: ca_pem(),
        ..profile()
    };
    let connector = MockConnector::default();
    let err = HysteriaOutbound::with_connector(&p, &connector)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AdapterError::Config { kind: ConfigErrorKind::ParseCa, .. }
    ));
    assert_eq!(err.to_string(), "hysteria hy.example.com:8443 failed to parse ca");
    assert!(connector.params().is_none());
}

#[tokio::test]
async fn unreadable_ca_file_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = ConnectionProfile {
        ca: dir.path().join("missing.pem").to_string_lossy().into_owned(),
        ..profile()
    };
    let err = HysteriaOutbound::with_connector(&p, &MockConnector::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdapterError::Config { kind: ConfigErrorKind::LoadCa { .. }, .. }
    ));
    assert!(err.to_string().starts_with("hysteria hy.example.com:8443 load ca error"));
}

#[tokio::test]
async fn inline_ca_builds_custom_pool() {
    let p = ConnectionProfile {
        ca_str: ca_pem(),
        ..profile()
    };
    let connector = MockConnector::default();
    HysteriaOutbound::with_connector(&p, &connector).await.unwrap();
    assert!(connector.params().unwrap().tls.has_custom_roots());
}

#[tokio::test]
async fn create_failure_is_wrapped_with_address() {
    let connector = MockConnector::failing(io::ErrorKind::TimedOut);
    let err = HysteriaOutbound::with_connector(&profile(), &connector)
        .await
        .unwrap_err();
    match &err {
        AdapterError::Config {
            addr,
            kind: ConfigErrorKind::Create(inner),
        } => {
            assert_eq!(addr, "hy.example.com:8443");
            assert_eq!(inner.kind(), io::ErrorKind::TimedOut);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "hysteria hy.example.com:8443 create error: mock server unreachable"
    );
}

#[tokio::test]
async fn stream_relays_through_session() {
    let out = outbound().await;
    let target: TargetAddr = "example.com:80".parse().unwrap();
    let mut stream = out
        .open_stream(&DialContext::background(), &target)
        .await
        .unwrap();
    assert_eq!(stream.adapter_chain(), ["hy-test"]);

    stream.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
    let mut buf = [0u8; 16];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"GET / HTTP/1.1\r\n");
}

#[tokio::test]
async fn stream_dial_error_is_unwrapped() {
    let out = outbound().await;
    let err = out
        .open_stream(&DialContext::background(), &TargetAddr::domain("refused.test", 80))
        .await
        .unwrap_err();
    match err {
        AdapterError::Dial(e) => {
            assert_eq!(e.kind(), io::ErrorKind::ConnectionRefused);
            assert_eq!(e.to_string(), "server refused stream");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_context_aborts_stalled_dial() {
    let out = outbound().await;
    let token = CancellationToken::new();
    let ctx = DialContext::with_cancel(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });
    let err = out
        .open_stream(&ctx, &TargetAddr::domain("stall.test", 443))
        .await
        .unwrap_err();
    canceller.await.unwrap();
    assert!(matches!(err, AdapterError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_stalled_dial() {
    let out = outbound().await;
    let ctx = DialContext::background().with_timeout(Duration::from_secs(5));
    let err = out
        .open_stream(&ctx, &TargetAddr::domain("stall.test", 443))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Timeout(d) if d == Duration::from_secs(5)));
}

#[tokio::test]
async fn read_from_truncates_to_buffer() {
    let out = outbound().await;
    let conn = out
        .open_packet_flow(&DialContext::background())
        .await
        .unwrap();
    let dest: TargetAddr = "8.8.8.8:53".parse().unwrap();

    let payload = vec![0xabu8; 100];
    assert_eq!(conn.write_to(&payload, &dest).await.unwrap(), 100);

    let mut small = [0u8; 10];
    let (n, from) = conn.read_from(&mut small).await.unwrap();
    assert_eq!(n, 10);
    assert_eq!(small, [0xab; 10]);
    assert_eq!(from, dest);
}

#[tokio::test]
async fn write_to_reports_full_length_or_zero_on_error() {
    let out = outbound().await;
    let conn = out
        .open_packet_flow(&DialContext::background())
        .await
        .unwrap();

    let big = vec![1u8; 1500];
    let n = conn
        .write_to(&big, &TargetAddr::domain("dns.example", 853))
        .await
        .unwrap();
    // Sent-byte count reflects acceptance by the flow, not delivery.
    assert_eq!(n, big.len());

    let err = conn
        .write_to(&big, &"0.0.0.0:9".parse().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
}

#[tokio::test]
async fn ipv6_and_domain_addresses_survive_the_bridge() {
    let out = outbound().await;
    let conn = out
        .open_packet_flow(&DialContext::background())
        .await
        .unwrap();
    let mut buf = [0u8; 64];

    for dest in [
        TargetAddr::from_host_port("2001:db8::53", 53),
        TargetAddr::domain("resolver.example", 5353),
    ] {
        conn.write_to(b"q", &dest).await.unwrap();
        let (_, from) = conn.read_from(&mut buf).await.unwrap();
        assert_eq!(from, dest);
    }
}

#[tokio::test]
async fn packet_flows_are_independent() {
    let out = outbound().await;
    let ctx = DialContext::background();
    let a = out.open_packet_flow(&ctx).await.unwrap();
    let b = out.open_packet_flow(&ctx).await.unwrap();
    let dest: TargetAddr = "1.1.1.1:53".parse().unwrap();

    a.write_to(b"from-a", &dest).await.unwrap();
    b.write_to(b"from-b", &dest).await.unwrap();

    let mut buf = [0u8; 32];
    let (n, _) = b.read_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n - 1], b"from-b");
    let b_id = buf[n - 1];
    let (n, _) = a.read_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n - 1], b"from-a");
    assert_ne!(buf[n - 1], b_id);

    a.close().await.unwrap();
    b.write_to(b"still", &dest).await.unwrap();
    let (n, _) = b.read_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n - 1], b"still");
}
