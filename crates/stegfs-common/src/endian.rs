//! Big-endian helpers shared by the permutator's round function and the
//! counter-mode stream cipher's 128-bit counter block.
//!
//! Grounded on `ext/zindosteg/steg_endian.h` (`read_be`/`write_be`) and the
//! `add128` helper in `ext/zindosteg/aes.cpp`.

/// Writes `value`'s low `buf.len()` bytes into `buf`, big-endian
/// (most-significant byte first, at `buf[0]`).
pub fn write_be_bytes(value: u64, buf: &mut [u8]) {
    let full = value.to_be_bytes();
    let n = buf.len();
    buf.copy_from_slice(&full[8 - n..]);
}

/// Reads `buf.len()` big-endian bytes back into a `u64`.
pub fn read_be_bytes(buf: &[u8]) -> u64 {
    let mut full = [0u8; 8];
    full[8 - buf.len()..].copy_from_slice(buf);
    u64::from_be_bytes(full)
}

/// Adds a signed delta to a 128-bit big-endian counter block in place,
/// mirroring `aes_ctr_mode`'s private `add128`: the low 8 bytes carry the
/// delta, and on over/underflow the high 8 bytes absorb a single +/-1
/// carry. This is sufficient for any delta that fits in an `i64`, which
/// covers every block-count delta reachable from a `u64` stream position.
pub fn add128_be(block: &mut [u8; 16], delta: i64) {
    let lo = read_be_bytes(&block[8..16]) as i64;
    let new_lo = lo.wrapping_add(delta);
    write_be_bytes(new_lo as u64, &mut block[8..16]);

    let carries = (delta < 0 && new_lo > lo) || (delta > 0 && new_lo < lo);
    if carries {
        let hi = read_be_bytes(&block[0..8]) as i64;
        let bump = if delta < 0 { -1i64 } else { 1i64 };
        write_be_bytes(hi.wrapping_add(bump) as u64, &mut block[0..8]);
    }
}
