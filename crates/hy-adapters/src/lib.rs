//! Outbound adapter for hysteria v1 servers.
//!
//! # Architecture
//!
//! - [`OutboundAdapter`]: what the routing layer calls to open streams and
//!   packet flows
//! - [`HysteriaOutbound`]: builds one session from a [`ConnectionProfile`]
//!   and serves every dial from it
//! - [`ProxyStream`] / [`ProxyPacketConn`]: generic capabilities returned to
//!   the caller
//! - [`DialContext`]: per-dial cancellation and deadline
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hy_adapters::{DialContext, HysteriaOutbound, OutboundAdapter};
//! use hy_config::ConnectionProfile;
//!
//! let profile = ConnectionProfile::load("hysteria.yaml")?;
//! let outbound = HysteriaOutbound::connect(&profile).await?;
//! let stream = outbound
//!     .open_stream(&DialContext::background(), &"example.com:443".parse()?)
//!     .await?;
//! ```
//!
//! [`ConnectionProfile`]: hy_config::ConnectionProfile

pub mod conn;
pub mod error;
pub mod outbound;
pub mod traits;

pub use conn::{ProxyPacketConn, ProxyStream};
pub use error::{AdapterError, ConfigErrorKind, Result};
pub use outbound::hysteria::{HyPacketConn, HysteriaOutbound};
pub use traits::{DialContext, OutboundAdapter, PacketConn};
