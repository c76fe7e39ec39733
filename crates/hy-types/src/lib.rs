//! hy-types: cross-crate stable contracts for the hysteria outbound.
//!
//! The generic network address used at the adapter boundary and the error
//! classification shared by logging.

pub mod addr;
pub mod errors;

pub use addr::{AddrParseError, TargetAddr};
pub use errors::ErrorClass;
