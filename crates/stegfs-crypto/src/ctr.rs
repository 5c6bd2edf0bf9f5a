//! Component B: the seekable counter-mode stream cipher.
//!
//! Grounded on `ext/zindosteg/aes.{h,cpp}`'s `aes_ctr_mode`: a 16-byte IV
//! doubles as the counter block, encrypted once per 16 bytes of keystream
//! and incremented as a big-endian 128-bit integer. `seek` recomputes the
//! counter block by adding the signed block delta rather than re-deriving
//! from scratch, exactly like the original.

use crate::block::{BlockCipher, BlockCipherError, BLOCK_SIZE};
use stegfs_common::endian::add128_be;

/// A seekable XOR keystream over an AES block cipher in counter mode.
///
/// `crypt(a); crypt(b)` at contiguous stream positions produces the same
/// output as a single `crypt` over `a || b`; `seek(p)` followed by `crypt`
/// matches the offset-`p` slice of the keystream that a single top-to-bottom
/// pass over the whole stream would have produced.
pub struct CtrStreamCipher {
    key: BlockCipher,
    iv: [u8; BLOCK_SIZE],
    buff: [u8; BLOCK_SIZE],
    pos: u64,
    buffpos: usize,
}

impl CtrStreamCipher {
    pub fn new(key: &[u8], iv: &[u8; BLOCK_SIZE]) -> Result<Self, BlockCipherError> {
        let key = BlockCipher::new(key)?;
        let mut buff = [0u8; BLOCK_SIZE];
        key.encrypt(iv, &mut buff);
        Ok(Self {
            key,
            iv: *iv,
            buff,
            pos: 0,
            buffpos: 0,
        })
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// XORs `length` keystream bytes into `input`, writing to `output`.
    /// `input` and `output` must have equal length at least `length`, and
    /// may alias (encryption and decryption are the same operation).
    pub fn crypt(&mut self, input: &[u8], output: &mut [u8], length: usize) {
        let mut done = 0usize;
        while done < length {
            let todo = (BLOCK_SIZE - self.buffpos).min(length - done);
            for i in 0..todo {
                output[done + i] = input[done + i] ^ self.buff[self.buffpos + i];
            }
            self.buffpos += todo;
            done += todo;
            self.pos += todo as u64;
            if self.buffpos >= BLOCK_SIZE {
                for b in self.iv.iter_mut().rev() {
                    let (next, overflowed) = b.overflowing_add(1);
                    *b = next;
                    if !overflowed {
                        break;
                    }
                }
                self.buffpos = 0;
                self.key.encrypt(&self.iv, &mut self.buff);
            }
        }
    }

    /// Sets the absolute stream position, re-keying the counter block only
    /// when the 16-byte block index actually changes.
    pub fn seek(&mut self, pos: u64) {
        let block = self.pos / BLOCK_SIZE as u64;
        let new_block = pos / BLOCK_SIZE as u64;
        self.buffpos = (pos % BLOCK_SIZE as u64) as usize;
        if block != new_block {
            let delta = new_block as i64 - block as i64;
            add128_be(&mut self.iv, delta);
            self.key.encrypt(&self.iv, &mut self.buff);
        }
        self.pos = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> CtrStreamCipher {
        CtrStreamCipher::new(&[0x11u8; 32], &[0x22u8; BLOCK_SIZE]).unwrap()
    }

    #[test]
    fn test_additivity_split_crypt_matches_whole() {
        let data: Vec<u8> = (0..200u16).map(|i| i as u8).collect();

        let mut whole_out = vec![0u8; data.len()];
        cipher().crypt(&data, &mut whole_out, data.len());

        let mut split_out = vec![0u8; data.len()];
        let mut c = cipher();
        c.crypt(&data[..37], &mut split_out[..37], 37);
        c.crypt(&data[37..], &mut split_out[37..], data.len() - 37);

        assert_eq!(whole_out, split_out);
    }

    #[test]
    fn test_seek_roundtrip_is_involution() {
        let mut c = cipher();
        let x = vec![0xABu8; 64];

        c.seek(100);
        let mut y = vec![0u8; x.len()];
        c.crypt(&x, &mut y, x.len());

        c.seek(100);
        let mut z = vec![0u8; x.len()];
        c.crypt(&y, &mut z, y.len());

        assert_eq!(x, z);
    }

    #[test]
    fn test_seek_matches_full_stream_slice() {
        let total_len = 300usize;
        let zeros = vec![0u8; total_len];
        let mut full_keystream = vec![0u8; total_len];
        cipher().crypt(&zeros, &mut full_keystream, total_len);

        let mut c = cipher();
        c.seek(123);
        let mut partial = vec![0u8; 50];
        c.crypt(&zeros[123..173], &mut partial, 50);

        assert_eq!(partial, full_keystream[123..173]);
    }

    #[test]
    fn test_seek_backward_then_forward() {
        let mut c = cipher();
        let x = vec![0x5Au8; 40];
        let mut forward = vec![0u8; x.len()];
        c.seek(500);
        c.crypt(&x, &mut forward, x.len());

        c.seek(10);
        let mut scratch = vec![0u8; 8];
        c.crypt(&x[..8], &mut scratch, 8);

        c.seek(500);
        let mut again = vec![0u8; x.len()];
        c.crypt(&x, &mut again, x.len());

        assert_eq!(forward, again);
    }
}
