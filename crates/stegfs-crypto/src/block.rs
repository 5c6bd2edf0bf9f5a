//! Component A: the 128-bit block cipher primitive.
//!
//! Grounded on `ext/zindosteg/aes.{h,cpp}`'s `aes` class, which wraps
//! OpenSSL's raw `AES_encrypt`/`AES_decrypt`/`AES_set_{en,de}crypt_key` with
//! no chaining and no padding. The Rust equivalent wraps the RustCrypto
//! `aes` crate's fixed-size block types behind a single runtime-keysize
//! enum, since the permutator and the CTR stream cipher both need to
//! `rekey` an existing instance rather than construct a new one.

use aes::{Aes128, Aes192, Aes256};
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use thiserror::Error;

/// One AES block, always 16 bytes regardless of key size.
pub const BLOCK_SIZE: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlockCipherError {
    #[error("unsupported AES key size: {0} bytes (must be 16, 24 or 32)")]
    UnsupportedKeySize(usize),
}

enum Keyed {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

/// A keyed 128-bit block cipher: `encrypt`/`decrypt` operate on single
/// 16-byte blocks with no chaining mode and no padding, exactly like the
/// original's `aes` class. Used directly by the permutator's Feistel round
/// function and as the block primitive underneath the CTR stream cipher.
pub struct BlockCipher {
    inner: Keyed,
}

impl BlockCipher {
    pub fn new(key: &[u8]) -> Result<Self, BlockCipherError> {
        Ok(Self {
            inner: Self::build(key)?,
        })
    }

    fn build(key: &[u8]) -> Result<Keyed, BlockCipherError> {
        match key.len() {
            16 => Ok(Keyed::Aes128(Aes128::new_from_slice(key).unwrap())),
            24 => Ok(Keyed::Aes192(Aes192::new_from_slice(key).unwrap())),
            32 => Ok(Keyed::Aes256(Aes256::new_from_slice(key).unwrap())),
            other => Err(BlockCipherError::UnsupportedKeySize(other)),
        }
    }

    /// Replaces the key material in place, as `aes::rekey` does.
    pub fn rekey(&mut self, key: &[u8]) -> Result<(), BlockCipherError> {
        self.inner = Self::build(key)?;
        Ok(())
    }

    pub fn encrypt(&self, input: &[u8; BLOCK_SIZE], output: &mut [u8; BLOCK_SIZE]) {
        output.copy_from_slice(input);
        let block = GenericArray::from_mut_slice(output);
        match &self.inner {
            Keyed::Aes128(k) => k.encrypt_block(block),
            Keyed::Aes192(k) => k.encrypt_block(block),
            Keyed::Aes256(k) => k.encrypt_block(block),
        }
    }

    /// Encrypts `block` in place.
    pub fn encrypt_in_place(&self, block: &mut [u8; BLOCK_SIZE]) {
        let ga = GenericArray::from_mut_slice(block);
        match &self.inner {
            Keyed::Aes128(k) => k.encrypt_block(ga),
            Keyed::Aes192(k) => k.encrypt_block(ga),
            Keyed::Aes256(k) => k.encrypt_block(ga),
        }
    }

    pub fn decrypt(&self, input: &[u8; BLOCK_SIZE], output: &mut [u8; BLOCK_SIZE]) {
        output.copy_from_slice(input);
        let block = GenericArray::from_mut_slice(output);
        match &self.inner {
            Keyed::Aes128(k) => k.decrypt_block(block),
            Keyed::Aes192(k) => k.decrypt_block(block),
            Keyed::Aes256(k) => k.decrypt_block(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_keysizes() {
        for keysize in [16, 24, 32] {
            let key = vec![0x42u8; keysize];
            let cipher = BlockCipher::new(&key).unwrap();
            let plain = [7u8; BLOCK_SIZE];
            let mut cipher_out = [0u8; BLOCK_SIZE];
            cipher.encrypt(&plain, &mut cipher_out);
            assert_ne!(cipher_out, plain);
            let mut decrypted = [0u8; BLOCK_SIZE];
            cipher.decrypt(&cipher_out, &mut decrypted);
            assert_eq!(decrypted, plain);
        }
    }

    #[test]
    fn test_rejects_bad_keysize() {
        let err = BlockCipher::new(&[0u8; 20]).unwrap_err();
        assert_eq!(err, BlockCipherError::UnsupportedKeySize(20));
    }

    /// FIPS-197 Appendix B known-answer test for AES-128.
    #[test]
    fn test_fips197_appendix_b_vector() {
        let key = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let plain: [u8; BLOCK_SIZE] = hex::decode("00112233445566778899aabbccddeeff")
            .unwrap()
            .try_into()
            .unwrap();
        let expected = hex::decode("69c4e0d86a7b0430d8cdb78070b4c55a").unwrap();

        let cipher = BlockCipher::new(&key).unwrap();
        let mut out = [0u8; BLOCK_SIZE];
        cipher.encrypt(&plain, &mut out);
        assert_eq!(out.to_vec(), expected);

        let mut back = [0u8; BLOCK_SIZE];
        cipher.decrypt(&out, &mut back);
        assert_eq!(back, plain);
    }

    #[test]
    fn test_rekey_changes_output() {
        let mut cipher = BlockCipher::new(&[1u8; 16]).unwrap();
        let plain = [9u8; BLOCK_SIZE];
        let mut a = [0u8; BLOCK_SIZE];
        cipher.encrypt(&plain, &mut a);

        cipher.rekey(&[2u8; 16]).unwrap();
        let mut b = [0u8; BLOCK_SIZE];
        cipher.encrypt(&plain, &mut b);

        assert_ne!(a, b);
    }
}
