//! Component H: the PNG carrier.
//!
//! Grounded on `ext/zindosteg/png_provider.{h,cpp}`. Decoding and encoding
//! proper are delegated to the `png` crate (which implements zlib
//! inflate/deflate and Adam7 de/interlacing for us); everything about which
//! bytes are addressable and how they're salted is transliterated from the
//! original so round-tripped carriers stay bit-compatible with it.

use crate::carrier::Carrier;
use png::{BitDepth, ColorType, Decoder, Encoder};
use stegfs_common::{StegError, StegResult};

/// A PNG carrier. Decoded once into a flat raw-sample buffer; `commit_to_memory`
/// re-encodes that buffer, always as a non-interlaced image (see DESIGN.md).
pub struct PngCarrier {
    width: u32,
    height: u32,
    color_type: ColorType,
    bit_depth: BitDepth,
    samples_per_pixel: usize,
    bytes_per_sample: usize,
    data: Vec<u8>,
}

impl PngCarrier {
    pub fn parse(data: &[u8]) -> StegResult<Self> {
        let decoder = Decoder::new(data);
        let mut reader = decoder
            .read_info()
            .map_err(|e| StegError::invalid_carrier(format!("PNG header: {e}")))?;

        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| StegError::invalid_carrier(format!("PNG decode: {e}")))?;
        buf.truncate(info.buffer_size());

        if info.color_type == ColorType::Indexed {
            return Err(StegError::invalid_carrier("palette PNGs are not supported carriers"));
        }
        if !matches!(info.bit_depth, BitDepth::Eight | BitDepth::Sixteen) {
            return Err(StegError::invalid_carrier(format!(
                "PNG bit depth {:?} below the minimum of 8",
                info.bit_depth
            )));
        }

        let bytes_per_sample = match info.bit_depth {
            BitDepth::Sixteen => 2,
            _ => 1,
        };
        let samples_per_pixel = match info.color_type {
            ColorType::Grayscale => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
            ColorType::Indexed => 1,
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            color_type: info.color_type,
            bit_depth: info.bit_depth,
            samples_per_pixel,
            bytes_per_sample,
            data: buf,
        })
    }

    /// Maps a logical sample index to its physical byte offset in `data`.
    /// For 16-bit images only the most significant byte of each sample is
    /// addressable — a quirk preserved verbatim from the original's
    /// `adjust_index` in `png_provider.cpp`.
    fn adjust_index(&self, index: u64) -> usize {
        index as usize * self.bytes_per_sample
    }

    fn row_stride(&self) -> usize {
        self.width as usize * self.samples_per_pixel * self.bytes_per_sample
    }
}

impl Carrier for PngCarrier {
    fn size(&self) -> u64 {
        (self.width as u64) * (self.height as u64) * (self.samples_per_pixel as u64)
    }

    fn get(&self, index: u64) -> u8 {
        self.data[self.adjust_index(index)]
    }

    fn set(&mut self, index: u64, value: u8) {
        let phys = self.adjust_index(index);
        self.data[phys] = (self.data[phys] & 0xFE) | (value & 1);
    }

    fn commit_to_memory(&mut self) -> StegResult<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut encoder = Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(self.color_type);
            encoder.set_depth(self.bit_depth);
            let mut writer = encoder
                .write_header()
                .map_err(|e| StegError::other(format!("PNG header write: {e}")))?;
            writer
                .write_image_data(&self.data)
                .map_err(|e| StegError::other(format!("PNG data write: {e}")))?;
        }
        Ok(out)
    }

    /// Folds the first byte of every row's sample into an 8-byte salt,
    /// matching `png_provider.cpp`'s `i * width + i % width` loop (run only
    /// while `i < height`, otherwise the cell index is out of range and the
    /// loop stops early on shallow images).
    fn salt(&self) -> [u8; 8] {
        let mut salt = [0u8; 8];
        let row_len = self.width as u64;
        for i in 0..self.height as u64 {
            let cell = i * row_len + i % row_len;
            if cell >= self.size() {
                break;
            }
            salt[(i as usize) % 8] = salt[(i as usize) % 8].wrapping_add(self.get(cell) >> 1);
        }
        salt
    }
}
