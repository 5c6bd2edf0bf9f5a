//! Component D: password-based key derivation.
//!
//! Grounded on `ext/zindosteg/key_generator.{h,cpp}`, which wraps OpenSSL's
//! `PKCS5_PBKDF2_HMAC_SHA1` with a default of 10000 iterations.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha1::Sha1;
use zeroize::Zeroizing;

/// Default iteration count, matching `key_generator`'s constructor default.
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Derives `length` bytes of key material from a UTF-8 password and a salt
/// using PBKDF2-HMAC-SHA1. Deterministic: same inputs always produce the
/// same output. Wrapped in `Zeroizing` so derived shuffler/stream keys
/// don't linger in memory past their owner's drop.
pub fn derive(password: &str, salt: &[u8], iterations: u32, length: usize) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; length]);
    if !key.is_empty() {
        pbkdf2::<Hmac<Sha1>>(password.as_bytes(), salt, iterations, &mut key)
            .expect("PBKDF2-HMAC-SHA1 output length is unbounded for this construction");
    }
    key
}

/// Convenience wrapper carrying a fixed password/salt/iteration triple, so
/// callers that need several differently-sized derivations (shuffler key,
/// then stream key + IV) don't have to re-pass the same three arguments —
/// mirrors `crypto::key_generator`'s reusable-instance API.
pub struct KeyGenerator<'a> {
    password: &'a str,
    salt: Vec<u8>,
    iterations: u32,
}

impl<'a> KeyGenerator<'a> {
    pub fn new(password: &'a str, salt: &[u8]) -> Self {
        Self::with_iterations(password, salt, DEFAULT_ITERATIONS)
    }

    pub fn with_iterations(password: &'a str, salt: &[u8], iterations: u32) -> Self {
        Self {
            password,
            salt: salt.to_vec(),
            iterations,
        }
    }

    pub fn generate(&self, length: usize) -> Zeroizing<Vec<u8>> {
        derive(self.password, &self.salt, self.iterations, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = derive("hunter2", b"saltsalt", 1000, 32);
        let b = derive("hunter2", b"saltsalt", 1000, 32);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_passwords_differ() {
        let a = derive("hunter2", b"saltsalt", 1000, 32);
        let b = derive("hunter3", b"saltsalt", 1000, 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_salts_differ() {
        let a = derive("hunter2", b"saltA", 1000, 32);
        let b = derive("hunter2", b"saltB", 1000, 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_requested_length_respected() {
        let key = derive("p", b"s", 100, 48);
        assert_eq!(key.len(), 48);
    }

    #[test]
    fn test_empty_length_returns_empty() {
        let key = derive("p", b"s", 100, 0);
        assert!(key.is_empty());
    }

    #[test]
    fn test_key_generator_matches_direct_call() {
        let gen = KeyGenerator::with_iterations("p", b"s", 500);
        assert_eq!(gen.generate(16), derive("p", b"s", 500, 16));
    }
}
