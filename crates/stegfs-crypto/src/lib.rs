//! # StegFS Crypto
//!
//! The cryptographic substrate of the stegfs engine: the AES block
//! primitive, a seekable counter-mode stream cipher built on it, an
//! HMAC-SHA256 keyed MAC, and PBKDF2-HMAC-SHA1 key derivation. Grounded on
//! `ext/zindosteg/{aes,hmac,key_generator}.{h,cpp}`.

pub mod block;
pub mod ctr;
pub mod kdf;
pub mod mac;

pub use block::{BlockCipher, BlockCipherError, BLOCK_SIZE};
pub use ctr::CtrStreamCipher;
pub use kdf::{derive, KeyGenerator, DEFAULT_ITERATIONS};
pub use mac::{verify as verify_mac, KeyedMac, DIGEST_SIZE};
