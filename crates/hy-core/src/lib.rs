//! # hy-core: session layer behind the hysteria outbound
//!
//! The outbound adapter only configures and wires a session together. The
//! pieces it wires are defined here as swappable seams:
//!
//! - [`session`]: [`Session`], [`PacketFlow`] and the construction primitive
//!   [`SessionConnector`] with its [`SessionParams`]
//! - [`obfs`]: [`Obfuscator`] and the salted-XOR [`XPlusObfuscator`]
//! - [`congestion`]: [`CongestionController`] and the fixed-rate [`BrutalSender`]
//! - [`transport`]: [`TransportSettings`] and their QUIC mapping
//! - [`quic`]: [`QuicConnector`], the QUIC-backed implementation of the
//!   hysteria v1 client
//! - [`platform`]: host capability checks

pub mod congestion;
pub mod obfs;
pub mod platform;
pub mod protocol;
pub mod quic;
pub mod session;
pub mod transport;

pub use congestion::{brutal_factory, BrutalSender, CongestionController, CongestionFactory};
pub use obfs::{Obfuscator, XPlusObfuscator};
pub use quic::QuicConnector;
pub use session::{
    AsyncStream, BoxedStream, DialerOptions, PacketFlow, Session, SessionConnector, SessionParams,
};
pub use transport::TransportSettings;
