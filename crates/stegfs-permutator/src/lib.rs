//! # StegFS Permutator
//!
//! Component E: a keyed pseudorandom permutation over an arbitrary integer
//! range `[0, N)`, built as a balanced Feistel network over AES — an
//! AES-FFX-A2 style construction. Grounded on
//! `ext/zindosteg/permutator.{h,cpp}`, which cites NIST's FFX proposal
//! directly.
//!
//! The device (`stegfs-device`) uses one instance of this to scatter
//! logical payload positions across the carrier's LSB-bearing cells with
//! constant additional memory per lookup — no precomputed table, so the
//! permutation scales to carriers with millions of cells.

use stegfs_common::endian::{read_be_bytes, write_be_bytes};
use stegfs_crypto::{BlockCipher, BlockCipherError, BLOCK_SIZE};

/// Index type used throughout: carrier cell indices and stream positions
/// are all `u64`, wide enough for any carrier this engine will address.
pub type Index = u64;

fn bit_length(mut n: u64) -> u8 {
    let mut len = 0u8;
    while n != 0 {
        len += 1;
        n >>= 1;
    }
    len
}

fn round_count(bitlen: u8) -> u8 {
    match bitlen {
        0..=9 => 36,
        10..=13 => 30,
        14..=19 => 24,
        20..=31 => 18,
        _ => 12,
    }
}

/// Immutable permutator context over `[0, size)`.
pub struct Permutator {
    size: Index,
    key: BlockCipher,
    bitlen: u8,
    split: u8,
    rounds: u8,
    mask: [u64; 2],
    p_template: [u8; BLOCK_SIZE],
}

impl Permutator {
    /// Builds a permutator over `[0, size)` keyed by a 16-byte AES key.
    pub fn new(size: Index, key: &[u8; 16]) -> Result<Self, BlockCipherError> {
        let block_key = BlockCipher::new(key)?;

        let bitlen = bit_length(size);
        let split = bitlen / 2;
        let split_prime = (bitlen + 1) / 2;
        let mask0 = if split == 0 { 0 } else { (1u64 << split) - 1 };
        let mask1 = if split_prime == 0 {
            0
        } else {
            (1u64 << split_prime) - 1
        };
        let rounds = round_count(bitlen);

        let mut p_template = [0u8; BLOCK_SIZE];
        p_template[0] = 0;
        p_template[1] = 1;
        p_template[2] = 2;
        p_template[3] = 0;
        p_template[4] = 2;
        p_template[5] = bitlen;
        p_template[6] = split;
        p_template[7] = rounds;
        let mut encrypted = [0u8; BLOCK_SIZE];
        block_key.encrypt(&p_template, &mut encrypted);

        Ok(Self {
            size,
            key: block_key,
            bitlen,
            split,
            rounds,
            mask: [mask0, mask1],
            p_template: encrypted,
        })
    }

    /// Size of the domain `[0, size)` this context was built over.
    pub fn size(&self) -> Index {
        self.size
    }

    /// Round function `F(r, B)`: folds the round index and the right half
    /// into a single AES block keyed with the derived key, masked to the
    /// appropriate half-width for round parity.
    fn round_fn(&self, r: u8, b: u64) -> u64 {
        let mut q = [0u8; BLOCK_SIZE];
        q[7] = r;
        write_be_bytes(b, &mut q[8..16]);
        for i in 0..BLOCK_SIZE {
            q[i] ^= self.p_template[i];
        }
        let mut out = [0u8; BLOCK_SIZE];
        self.key.encrypt(&q, &mut out);
        let half = read_be_bytes(&out[8..16]);
        half & self.mask[(r % 2) as usize]
    }

    /// Encrypts index `i`: the permutator's forward mapping `P(i)`.
    pub fn encrypt(&self, index: Index) -> Index {
        if self.size == 0 {
            return index;
        }
        let mut i = index;
        loop {
            let mut a = i & self.mask[0];
            let mut b = i >> self.split;
            for r in 0..self.rounds {
                let c = a ^ self.round_fn(r, b);
                a = b;
                b = c;
            }
            let j = (b << self.split) | a;
            if j < self.size {
                return j;
            }
            i = j;
        }
    }

    /// Decrypts index `j`: the permutator's inverse mapping. Inverts
    /// `encrypt` exactly: `reverse(encrypt(i)) == i` for all `i < size`.
    pub fn reverse(&self, index: Index) -> Index {
        if self.size == 0 {
            return index;
        }
        let mut j = index;
        loop {
            let mut a = j & self.mask[0];
            let mut b = j >> self.split;
            for r in (1..=self.rounds).rev() {
                let c = b;
                b = a;
                a = c ^ self.round_fn(r - 1, b);
            }
            let i = (b << self.split) | a;
            if i < self.size {
                return i;
            }
            j = i;
        }
    }

    /// Bit length of the domain, exposed for diagnostics/tests.
    pub fn bit_length(&self) -> u8 {
        self.bitlen
    }
}
