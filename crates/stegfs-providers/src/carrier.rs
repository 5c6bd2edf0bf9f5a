//! Component F: the carrier provider abstraction.
//!
//! Grounded on `ext/zindosteg/provider.h`'s `provider_t` interface: a tiny
//! capability set any image codec can implement to expose "N independently
//! addressable LSB-bearing cells." The codec is selected once at load time
//! by sniffing the header, and never changes identity afterward — so this
//! is modeled as a closed, tagged enum (`AnyCarrier`) rather than a trait
//! object.

use crate::{bmp::BmpCarrier, jpeg::JpegCarrier, png::PngCarrier};
use std::path::Path;
use stegfs_common::{StegError, StegResult};

/// Number of header bytes inspected to sniff the carrier format.
const SNIFF_LEN: usize = 64;

/// The capability set every carrier format implements.
pub trait Carrier {
    /// Number of independently addressable, LSB-bearing cells.
    fn size(&self) -> u64;

    /// Reads cell `index`. Only the LSB of the returned byte is
    /// steganographically meaningful; bits 7..1 are carrier data.
    fn get(&self, index: u64) -> u8;

    /// Flips bits of cell `index` to match `value`'s LSB. Implementations
    /// must change only the LSB; the remaining 7 bits are untouched.
    fn set(&mut self, index: u64, value: u8);

    /// Serializes the carrier's current state to its on-disk image format.
    fn commit_to_memory(&mut self) -> StegResult<Vec<u8>>;

    /// Same as `commit_to_memory`, written directly to `path`.
    fn commit_to_file(&mut self, path: &Path) -> StegResult<()> {
        let bytes = self.commit_to_memory()?;
        std::fs::write(path, bytes).map_err(|e| StegError::other(e.to_string()))
    }

    /// An 8-byte digest of carrier content, stable across LSB rewrites.
    fn salt(&self) -> [u8; 8];
}

/// A loaded carrier, dispatched to one of the three supported codecs.
pub enum AnyCarrier {
    Bmp(BmpCarrier),
    Png(PngCarrier),
    Jpeg(JpegCarrier),
}

impl Carrier for AnyCarrier {
    fn size(&self) -> u64 {
        match self {
            AnyCarrier::Bmp(c) => c.size(),
            AnyCarrier::Png(c) => c.size(),
            AnyCarrier::Jpeg(c) => c.size(),
        }
    }

    fn get(&self, index: u64) -> u8 {
        match self {
            AnyCarrier::Bmp(c) => c.get(index),
            AnyCarrier::Png(c) => c.get(index),
            AnyCarrier::Jpeg(c) => c.get(index),
        }
    }

    fn set(&mut self, index: u64, value: u8) {
        match self {
            AnyCarrier::Bmp(c) => c.set(index, value),
            AnyCarrier::Png(c) => c.set(index, value),
            AnyCarrier::Jpeg(c) => c.set(index, value),
        }
    }

    fn commit_to_memory(&mut self) -> StegResult<Vec<u8>> {
        match self {
            AnyCarrier::Bmp(c) => c.commit_to_memory(),
            AnyCarrier::Png(c) => c.commit_to_memory(),
            AnyCarrier::Jpeg(c) => c.commit_to_memory(),
        }
    }

    fn salt(&self) -> [u8; 8] {
        match self {
            AnyCarrier::Bmp(c) => c.salt(),
            AnyCarrier::Png(c) => c.salt(),
            AnyCarrier::Jpeg(c) => c.salt(),
        }
    }
}

/// Loads a carrier from a file path, sniffing the header to pick a codec.
pub fn load_file(path: &Path) -> StegResult<AnyCarrier> {
    let data = std::fs::read(path).map_err(|e| StegError::invalid_carrier(e.to_string()))?;
    load_bytes(&data)
}

/// Loads a carrier from an in-memory buffer, sniffing the header to pick a
/// codec: BMP (`"BM"`), JPEG (`FF D8 FF` + `JFIF`/`Exif` at byte 6), PNG
/// (the 8-byte PNG signature); anything else is rejected.
pub fn load_bytes(data: &[u8]) -> StegResult<AnyCarrier> {
    if data.len() < SNIFF_LEN {
        return Err(StegError::invalid_carrier("carrier too small to sniff"));
    }

    if &data[0..2] == b"BM" {
        tracing::debug!("sniffed carrier as BMP");
        return Ok(AnyCarrier::Bmp(BmpCarrier::parse(data)?));
    }

    if data[0] == 0xFF
        && data[1] == 0xD8
        && data[2] == 0xFF
        && (&data[6..10] == b"JFIF" || &data[6..10] == b"Exif")
    {
        tracing::debug!("sniffed carrier as JPEG");
        return Ok(AnyCarrier::Jpeg(JpegCarrier::parse(data)?));
    }

    const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    if data[0..8] == PNG_SIGNATURE {
        tracing::debug!("sniffed carrier as PNG");
        return Ok(AnyCarrier::Png(PngCarrier::parse(data)?));
    }

    Err(StegError::invalid_carrier("no matching codec for header"))
}
