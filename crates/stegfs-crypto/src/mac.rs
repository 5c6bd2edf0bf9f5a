//! Component C: the keyed MAC authenticating the payload plaintext.
//!
//! Grounded on `ext/zindosteg/hmac.h`'s RAII wrapper over OpenSSL's
//! `HMAC_CTX` keyed with SHA-256. `verify` is a constant-time comparison,
//! so a mismatched digest never leaks timing information about where
//! the first differing byte is.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Digest size of the keyed MAC, in bytes.
pub const DIGEST_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Incremental HMAC-SHA256 accumulator, reset-able like the original's
/// `hmac::reset()` so a single instance can be reused across opens.
pub struct KeyedMac {
    key: Vec<u8>,
    mac: HmacSha256,
}

impl KeyedMac {
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: key.to_vec(),
            mac: HmacSha256::new_from_slice(key).expect("HMAC accepts any key length"),
        }
    }

    /// Restarts accumulation with the same key.
    pub fn reset(&mut self) {
        self.mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
    }

    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    pub fn finalize(self) -> [u8; DIGEST_SIZE] {
        let bytes = self.mac.finalize().into_bytes();
        let mut out = [0u8; DIGEST_SIZE];
        out.copy_from_slice(&bytes);
        out
    }
}

/// Constant-time equality test between two MAC digests.
pub fn verify(computed: &[u8; DIGEST_SIZE], stored: &[u8; DIGEST_SIZE]) -> bool {
    computed.ct_eq(stored).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_and_data_match() {
        let mut a = KeyedMac::new(b"password");
        a.update(b"hello world");
        let digest_a = a.finalize();

        let mut b = KeyedMac::new(b"password");
        b.update(b"hello world");
        let digest_b = b.finalize();

        assert!(verify(&digest_a, &digest_b));
    }

    #[test]
    fn test_different_data_does_not_match() {
        let mut a = KeyedMac::new(b"password");
        a.update(b"hello world");
        let digest_a = a.finalize();

        let mut b = KeyedMac::new(b"password");
        b.update(b"goodbye world");
        let digest_b = b.finalize();

        assert!(!verify(&digest_a, &digest_b));
    }

    #[test]
    fn test_chunked_update_equals_single_update() {
        let mut a = KeyedMac::new(b"k");
        a.update(b"abcdef");
        let whole = a.finalize();

        let mut b = KeyedMac::new(b"k");
        b.update(b"abc");
        b.update(b"def");
        let chunked = b.finalize();

        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_reset_matches_fresh_instance() {
        let mut a = KeyedMac::new(b"k");
        a.update(b"garbage");
        a.reset();
        a.update(b"data");
        let reset_digest = a.finalize();

        let mut b = KeyedMac::new(b"k");
        b.update(b"data");
        let fresh_digest = b.finalize();

        assert_eq!(reset_digest, fresh_digest);
    }
}
