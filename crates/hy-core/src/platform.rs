//! Host capability checks.

/// Whether the platform lacks kernel support for path MTU discovery on UDP
/// sockets used by the QUIC stack.
#[inline]
pub const fn path_mtu_discovery_unsupported() -> bool {
    !cfg!(any(
        target_os = "linux",
        target_os = "android",
        target_os = "windows",
        target_os = "macos",
        target_os = "ios"
    ))
}
