//! Outbound adapters.

pub mod hysteria;

pub mod prelude {
    //! Common imports for adapter implementations
    pub use crate::conn::{ProxyPacketConn, ProxyStream};
    pub use crate::error::{AdapterError, Result};
    pub use crate::traits::{DialContext, OutboundAdapter, PacketConn};
    pub use async_trait::async_trait;
}
