//! Profile to [`TransportSettings`].

use hy_config::ConnectionProfile;
use hy_core::transport::{DEFAULT_CONNECTION_RECEIVE_WINDOW, DEFAULT_STREAM_RECEIVE_WINDOW};
use hy_core::{platform, TransportSettings};

/// Effective transport settings for `profile` on this host.
pub fn build_transport_settings(profile: &ConnectionProfile) -> TransportSettings {
    settings_for(profile, platform::path_mtu_discovery_unsupported())
}

fn or_default(value: u64, default: u64) -> u64 {
    if value == 0 {
        default
    } else {
        value
    }
}

pub(crate) fn settings_for(profile: &ConnectionProfile, pmtud_unsupported: bool) -> TransportSettings {
    let stream = or_default(profile.recv_window, DEFAULT_STREAM_RECEIVE_WINDOW);
    let conn = or_default(profile.recv_window_conn, DEFAULT_CONNECTION_RECEIVE_WINDOW);

    let mut disable_pmtud = profile.disable_mtu_discovery;
    if pmtud_unsupported && !disable_pmtud {
        tracing::info!("Path MTU Discovery is not yet supported on this platform");
        disable_pmtud = true;
    }

    TransportSettings {
        initial_stream_receive_window: stream,
        max_stream_receive_window: stream,
        initial_connection_receive_window: conn,
        max_connection_receive_window: conn,
        keep_alive: true,
        enable_datagrams: true,
        disable_path_mtu_discovery: disable_pmtud,
    }
}
