//! Rate-string parsing.
//!
//! Grammar: `^([0-9]+)\s*([KMGT]?)([Bb])ps$`. Magnitudes are binary (K = 2^10
//! … T = 2^40). A lowercase `b` means bits and the result is shifted right by
//! three; uppercase `B` is already bytes. The empty string means "not set" and
//! parses to `0`; every other mismatch is an error, so a `0` coming out of a
//! non-empty string (`"0Bps"`) is always a real zero.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Bytes per second in one (decimal) megabit per second.
pub const MBPS_TO_BPS: u64 = 125_000;

static RATE_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)\s*([KMGT]?)([Bb])ps$").expect("rate pattern is a valid regex")
});

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BandwidthError {
    #[error("invalid speed format: {0:?}")]
    InvalidFormat(String),
    #[error("speed out of range: {0:?}")]
    Overflow(String),
}

/// Parse a rate string into bytes per second.
pub fn parse_rate(s: &str) -> Result<u64, BandwidthError> {
    if s.is_empty() {
        return Ok(0);
    }
    let caps = RATE_STRING
        .captures(s)
        .ok_or_else(|| BandwidthError::InvalidFormat(s.to_string()))?;

    let multiplier: u64 = match &caps[2] {
        "K" => 1 << 10,
        "M" => 1 << 20,
        "G" => 1 << 30,
        "T" => 1 << 40,
        _ => 1,
    };
    let value = caps[1]
        .parse::<u64>()
        .map_err(|_| BandwidthError::Overflow(s.to_string()))?;
    let n = value
        .checked_mul(multiplier)
        .ok_or_else(|| BandwidthError::Overflow(s.to_string()))?;

    Ok(if &caps[3] == "b" { n >> 3 } else { n })
}

/// Resolve one direction: a non-empty rate string wins over the Mbps integer.
///
/// The integer fallback may legitimately be zero (unset / auto).
pub fn resolve_rate(rate: &str, mbps: u32) -> Result<u64, BandwidthError> {
    if rate.is_empty() {
        Ok(u64::from(mbps) * MBPS_TO_BPS)
    } else {
        parse_rate(rate)
    }
}

/// Effective upload/download rates in bytes per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Speed {
    pub up_bps: u64,
    pub down_bps: u64,
}

impl Speed {
    pub fn resolve(up: &str, up_mbps: u32, down: &str, down_mbps: u32) -> Result<Self, BandwidthError> {
        Ok(Self {
            up_bps: resolve_rate(up, up_mbps)?,
            down_bps: resolve_rate(down, down_mbps)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_unset() {
        assert_eq!(parse_rate(""), Ok(0));
    }

    #[test]
    fn bits_and_bytes() {
        assert_eq!(parse_rate("100Mbps"), Ok(13_107_200));
        assert_eq!(parse_rate("100MBps"), Ok(104_857_600));
        assert_eq!(parse_rate("8Mbps"), parse_rate("1MBps"));
        assert_eq!(parse_rate("100 Mbps"), Ok(13_107_200));
        assert_eq!(parse_rate("1Kbps"), Ok(128));
        assert_eq!(parse_rate("3bps"), Ok(0));
        assert_eq!(parse_rate("2TBps"), Ok(2 << 40));
    }

    #[test]
    fn zero_is_a_value_not_an_error() {
        assert_eq!(parse_rate("0Bps"), Ok(0));
        assert_eq!(parse_rate("0 Gbps"), Ok(0));
    }

    #[test]
    fn malformed_strings_fail() {
        for s in ["100", "100ps", "Mbps", "100mbps", "100 MBPS", " 100Mbps", "1.5Mbps", "-1Mbps", "100kBps"] {
            assert!(
                matches!(parse_rate(s), Err(BandwidthError::InvalidFormat(_))),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn overflow_is_rejected() {
        // u64::MAX itself fits, multiplied by 1 it is fine.
        assert_eq!(parse_rate("18446744073709551615Bps"), Ok(u64::MAX));
        assert!(matches!(
            parse_rate("18446744073709551616Bps"),
            Err(BandwidthError::Overflow(_))
        ));
        assert!(matches!(
            parse_rate("17179869184GBps"),
            Err(BandwidthError::Overflow(_))
        ));
    }

    #[test]
    fn string_takes_precedence_over_mbps() {
        assert_eq!(resolve_rate("1MBps", 100), Ok(1 << 20));
        assert_eq!(resolve_rate("", 100), Ok(100 * MBPS_TO_BPS));
        assert_eq!(resolve_rate("", 0), Ok(0));
        assert!(resolve_rate("fast", 100).is_err());
    }

    #[test]
    fn speed_resolves_both_directions() {
        let speed = Speed::resolve("10 Mbps", 0, "", 50).unwrap();
        assert_eq!(speed.up_bps, 10 * (1 << 20) / 8);
        assert_eq!(speed.down_bps, 50 * MBPS_TO_BPS);
        assert!(Speed::resolve("", 10, "bogus", 0).is_err());
    }
}
