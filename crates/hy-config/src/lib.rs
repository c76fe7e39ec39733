//! Configuration model for the hysteria outbound.
//!
//! - [`ConnectionProfile`]: the user-supplied outbound options, deserialized
//!   with the field names used by proxy configuration files
//! - [`bandwidth`]: rate-string parsing (`"100 Mbps"` → bytes per second) and
//!   up/down speed resolution

pub mod bandwidth;
pub mod profile;

pub use bandwidth::{parse_rate, BandwidthError, Speed, MBPS_TO_BPS};
pub use profile::{ConnectionProfile, ProfileError};
