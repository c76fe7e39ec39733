//! QUIC transport parameters for the session.

use quinn::{IdleTimeout, TransportConfig, VarInt};
use std::sync::Arc;
use std::time::Duration;

/// Stream-level receive window used when the profile leaves it at zero.
pub const DEFAULT_STREAM_RECEIVE_WINDOW: u64 = 15 * 1024 * 1024;
/// Connection-level receive window used when the profile leaves it at zero.
pub const DEFAULT_CONNECTION_RECEIVE_WINDOW: u64 = 64 * 1024 * 1024;

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Effective flow-control and path settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub initial_stream_receive_window: u64,
    pub max_stream_receive_window: u64,
    pub initial_connection_receive_window: u64,
    pub max_connection_receive_window: u64,
    pub keep_alive: bool,
    pub enable_datagrams: bool,
    pub disable_path_mtu_discovery: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            initial_stream_receive_window: DEFAULT_STREAM_RECEIVE_WINDOW,
            max_stream_receive_window: DEFAULT_STREAM_RECEIVE_WINDOW,
            initial_connection_receive_window: DEFAULT_CONNECTION_RECEIVE_WINDOW,
            max_connection_receive_window: DEFAULT_CONNECTION_RECEIVE_WINDOW,
            keep_alive: true,
            enable_datagrams: true,
            disable_path_mtu_discovery: false,
        }
    }
}

fn varint(v: u64) -> VarInt {
    VarInt::from_u64(v).unwrap_or(VarInt::MAX)
}

impl TransportSettings {
    /// Map onto a quinn transport config.
    ///
    /// quinn windows are fixed rather than auto-tuned, so the maximum window of
    /// each category is the one applied.
    pub fn quinn_config(
        &self,
        congestion: Arc<dyn quinn::congestion::ControllerFactory + Send + Sync>,
    ) -> TransportConfig {
        let mut t = TransportConfig::default();
        t.stream_receive_window(varint(self.max_stream_receive_window));
        t.receive_window(varint(self.max_connection_receive_window));
        t.max_idle_timeout(IdleTimeout::try_from(MAX_IDLE_TIMEOUT).ok());
        if self.keep_alive {
            t.keep_alive_interval(Some(KEEP_ALIVE_INTERVAL));
        }
        if !self.enable_datagrams {
            t.datagram_receive_buffer_size(None);
        }
        if self.disable_path_mtu_discovery {
            t.mtu_discovery_config(None);
        }
        t.congestion_controller_factory(congestion);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let t = TransportSettings::default();
        assert_eq!(t.initial_stream_receive_window, 15_728_640);
        assert_eq!(t.max_connection_receive_window, 67_108_864);
        assert!(t.keep_alive && t.enable_datagrams);
    }

    #[test]
    fn oversized_window_clamps_to_varint_max() {
        assert_eq!(varint(u64::MAX), VarInt::MAX);
        assert_eq!(varint(1024).into_inner(), 1024);
    }

    #[test]
    fn quinn_mapping_builds() {
        let t = TransportSettings {
            disable_path_mtu_discovery: true,
            ..Default::default()
        };
        let _cfg = t.quinn_config(Arc::new(quinn::congestion::CubicConfig::default()));
    }
}
