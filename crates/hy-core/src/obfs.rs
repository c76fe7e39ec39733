//! Packet obfuscation.
//!
//! [`XPlusObfuscator`] prefixes every packet with a random 16-byte salt and
//! XORs the payload with `SHA-256(key || salt)`, cycling the digest.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use std::fmt;

/// Reversible per-packet byte transform.
pub trait Obfuscator: Send + Sync + fmt::Debug {
    /// Bytes added to every packet by [`Obfuscator::obfuscate`].
    fn overhead(&self) -> usize;

    /// Write the obfuscated form of `input` into `out`; returns the length
    /// written, or 0 if `out` is too small.
    fn obfuscate(&self, input: &[u8], out: &mut [u8]) -> usize;

    /// Reverse [`Obfuscator::obfuscate`]; returns 0 for packets that cannot
    /// be decoded (too short, or `out` too small).
    fn deobfuscate(&self, input: &[u8], out: &mut [u8]) -> usize;
}

const SALT_LEN: usize = 16;

pub struct XPlusObfuscator {
    key: Vec<u8>,
    rng: Mutex<StdRng>,
}

impl XPlusObfuscator {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    fn keystream(&self, salt: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.key);
        hasher.update(salt);
        hasher.finalize().into()
    }
}

impl fmt::Debug for XPlusObfuscator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPlusObfuscator")
            .field("key_len", &self.key.len())
            .finish()
    }
}

impl Obfuscator for XPlusObfuscator {
    fn overhead(&self) -> usize {
        SALT_LEN
    }

    fn obfuscate(&self, input: &[u8], out: &mut [u8]) -> usize {
        let out_len = input.len() + SALT_LEN;
        if out.len() < out_len {
            return 0;
        }
        self.rng.lock().fill_bytes(&mut out[..SALT_LEN]);
        let key = self.keystream(&out[..SALT_LEN]);
        for (i, (dst, b)) in out[SALT_LEN..out_len].iter_mut().zip(input).enumerate() {
            *dst = b ^ key[i % key.len()];
        }
        out_len
    }

    fn deobfuscate(&self, input: &[u8], out: &mut [u8]) -> usize {
        if input.len() <= SALT_LEN {
            return 0;
        }
        let out_len = input.len() - SALT_LEN;
        if out.len() < out_len {
            return 0;
        }
        let key = self.keystream(&input[..SALT_LEN]);
        for (i, (dst, b)) in out[..out_len].iter_mut().zip(&input[SALT_LEN..]).enumerate() {
            *dst = b ^ key[i % key.len()];
        }
        out_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverses_with_same_key() {
        let obfs = XPlusObfuscator::new(b"secret".to_vec());
        let payload: Vec<u8> = (0..100u8).collect();
        let mut wire = vec![0u8; 200];
        let n = obfs.obfuscate(&payload, &mut wire);
        assert_eq!(n, payload.len() + SALT_LEN);
        assert_ne!(&wire[SALT_LEN..n], &payload[..]);

        let mut plain = vec![0u8; 200];
        let m = obfs.deobfuscate(&wire[..n], &mut plain);
        assert_eq!(&plain[..m], &payload[..]);
    }

    #[test]
    fn salts_differ_per_packet() {
        let obfs = XPlusObfuscator::new("k");
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        obfs.obfuscate(b"same", &mut a);
        obfs.obfuscate(b"same", &mut b);
        assert_ne!(a[..SALT_LEN + 4], b[..SALT_LEN + 4]);
    }

    #[test]
    fn wrong_key_garbles() {
        let mut wire = [0u8; 64];
        let n = XPlusObfuscator::new("a").obfuscate(b"hello world", &mut wire);
        let mut plain = [0u8; 64];
        let m = XPlusObfuscator::new("b").deobfuscate(&wire[..n], &mut plain);
        assert_eq!(m, 11);
        assert_ne!(&plain[..m], b"hello world");
    }

    #[test]
    fn short_or_cramped_buffers_yield_zero() {
        let obfs = XPlusObfuscator::new("k");
        let mut out = [0u8; 8];
        assert_eq!(obfs.obfuscate(b"hello", &mut out), 0);
        assert_eq!(obfs.deobfuscate(&[0u8; SALT_LEN], &mut out), 0);
        assert_eq!(obfs.deobfuscate(&[0u8; SALT_LEN + 9], &mut out), 0);
    }
}
