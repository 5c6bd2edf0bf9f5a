//! Component I: the JPEG carrier.
//!
//! Grounded on `ext/zindosteg/jpeg.cpp` and `jpeg_helpers.cpp`. Rather than
//! LSBs of decoded pixels, JPEG carriers steal the LSB of each quantized
//! DCT coefficient's low byte — the only representation libjpeg lets us
//! touch without a lossy re-encode. `mozjpeg-sys` is used instead of a
//! higher-level crate because this needs the exact libjpeg coefficient API
//! the original calls: `jpeg_read_coefficients`, `access_virt_barray`,
//! `jpeg_write_coefficients`, and `jpeg_copy_critical_parameters` to carry
//! over quantization tables and marker segments unchanged.

use mozjpeg_sys::{
    boolean, j_common_ptr, jpeg_CreateCompress, jpeg_CreateDecompress, jpeg_compress_struct,
    jpeg_copy_critical_parameters, jpeg_decompress_struct, jpeg_destroy_compress,
    jpeg_destroy_decompress, jpeg_error_mgr, jpeg_finish_compress, jpeg_mem_dest, jpeg_mem_src,
    jpeg_read_coefficients, jpeg_read_header, jpeg_save_markers, jpeg_std_error,
    jpeg_write_coefficients, jpeg_write_marker, JPEG_LIB_VERSION, DCTSIZE2,
};
use std::os::raw::c_int;
use stegfs_common::{StegError, StegResult};

const JPEG_COM: c_int = 0xFE;
const JPEG_APP0: c_int = 0xE0;

/// Generously oversized opaque `jmp_buf`. `setjmp`/`longjmp` write and read
/// through a fixed, platform-defined struct baked into the C library at the
/// time it was built; they never receive a length, so a buffer at least as
/// large as the real one is indistinguishable to them from an exact-sized
/// one. 768 bytes clears every mainstream 64-bit ABI's `jmp_buf` (including
/// the extra float/vector register state some save) with room to spare.
/// Windows' `_setjmp` calling convention differs and is out of scope.
#[repr(C, align(16))]
struct JmpBuf([u8; 768]);

extern "C" {
    fn setjmp(env: *mut JmpBuf) -> c_int;
    fn longjmp(env: *mut JmpBuf, val: c_int) -> !;
}

/// A libjpeg error manager extended with the `jmp_buf` `error_exit` escapes
/// through. `pub_` must stay the first field: libjpeg only ever sees a
/// pointer to it (via `common.err`), and `error_exit` casts that pointer
/// back to `*mut CarrierErrorMgr` to reach `setjmp_buffer`.
#[repr(C)]
struct CarrierErrorMgr {
    pub_: jpeg_error_mgr,
    setjmp_buffer: JmpBuf,
}

/// A JPEG carrier addressing the low byte of each component's quantized
/// DCT coefficients directly, via libjpeg's virtual block-array API.
pub struct JpegCarrier {
    original: Vec<u8>,
    info: Box<jpeg_decompress_struct>,
    err: Box<CarrierErrorMgr>,
    width_in_blocks: Vec<usize>,
    height_in_blocks: Vec<usize>,
    comp_sz: Vec<u64>,
    total_sz: u64,
}

// Safety: `info`/`err` are heap-allocated and self-referential only through
// the libjpeg C pointers we set up once in `parse`, never moved afterward
// because they live behind `Box`. No two `JpegCarrier`s ever share a
// `jpeg_decompress_struct`, so single-threaded access is the only
// requirement, matching the original's usage.
unsafe impl Send for JpegCarrier {}

/// Escapes back to the nearest enclosing `setjmp` instead of returning,
/// since libjpeg's contract requires `error_exit` to never return control
/// to the library (doing so leaves it executing on state it considers
/// fatally broken).
extern "C" fn error_exit(cinfo: j_common_ptr) {
    unsafe {
        let mgr = (*cinfo).err as *mut CarrierErrorMgr;
        longjmp(&mut (*mgr).setjmp_buffer, 1);
    }
}

impl JpegCarrier {
    pub fn parse(data: &[u8]) -> StegResult<Self> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
            return Err(StegError::invalid_carrier("not a JPEG file"));
        }

        let mut info: Box<jpeg_decompress_struct> = Box::new(unsafe { std::mem::zeroed() });
        let mut err: Box<CarrierErrorMgr> = Box::new(unsafe { std::mem::zeroed() });

        unsafe {
            jpeg_std_error(&mut err.pub_);
            err.pub_.error_exit = Some(error_exit);
            info.common.err = &mut err.pub_;
        }

        // SAFETY: `setjmp` is called directly in the frame `error_exit` will
        // jump back into; it cannot be hoisted behind a helper call. A
        // nonzero return means a fatal libjpeg error unwound here through
        // `longjmp` — `info`'s internal state beyond this point is
        // considered broken and only `jpeg_destroy_decompress` may touch it.
        let jumped = unsafe { setjmp(&mut err.setjmp_buffer) };
        if jumped != 0 {
            unsafe { jpeg_destroy_decompress(info.as_mut()) };
            return Err(StegError::invalid_carrier(
                "libjpeg reported a fatal error reading this carrier",
            ));
        }

        let component_count;
        let mut width_in_blocks;
        let mut height_in_blocks;
        let mut comp_sz;
        let mut total_sz: u64 = 0;

        unsafe {
            jpeg_CreateDecompress(
                info.as_mut(),
                JPEG_LIB_VERSION,
                std::mem::size_of::<jpeg_decompress_struct>(),
            );

            jpeg_save_markers(info.as_mut(), JPEG_COM, 0xFFFF);
            for i in 1..=15 {
                jpeg_save_markers(info.as_mut(), JPEG_APP0 + i, 0xFFFF);
            }

            jpeg_mem_src(info.as_mut(), data.as_ptr(), data.len() as u64);
            jpeg_read_header(info.as_mut(), true as boolean);

            let coeffs = jpeg_read_coefficients(info.as_mut());
            if coeffs.is_null() {
                jpeg_destroy_decompress(info.as_mut());
                return Err(StegError::invalid_carrier("JPEG coefficient read failed"));
            }

            component_count = info.num_components as usize;
            width_in_blocks = Vec::with_capacity(component_count);
            height_in_blocks = Vec::with_capacity(component_count);
            comp_sz = Vec::with_capacity(component_count);

            for i in 0..component_count {
                let comp = *info.comp_info.add(i);
                let w = comp.width_in_blocks as usize;
                let h = comp.height_in_blocks as usize;
                let sz = (w * h * DCTSIZE2 as usize) as u64;
                width_in_blocks.push(w);
                height_in_blocks.push(h);
                comp_sz.push(sz);
                total_sz += sz;
            }
        }

        Ok(Self {
            original: data.to_vec(),
            info,
            err,
            width_in_blocks,
            height_in_blocks,
            comp_sz,
            total_sz,
        })
    }

    /// Mirrors `index_to_coordinates`: splits a flat index into
    /// `(component, row, col, coefficient-within-block)`.
    fn index_to_coordinates(&self, index: u64) -> (usize, usize, usize, usize) {
        let mut remaining = index;
        let mut comp = 0usize;
        for (c, &sz) in self.comp_sz.iter().enumerate() {
            if remaining < sz {
                comp = c;
                break;
            }
            remaining -= sz;
        }
        let row_sz = (self.width_in_blocks[comp] * DCTSIZE2 as usize) as u64;
        let row = (remaining / row_sz) as usize;
        let col = ((remaining % row_sz) / DCTSIZE2 as u64) as usize;
        let block = (remaining % DCTSIZE2 as u64) as usize;
        (comp, row, col, block)
    }

    /// Low byte of coefficient `(comp, row, col, block)`, little-endian —
    /// matches the original's `INT16_LSB` byte selection.
    fn access(&mut self, index: u64, write: Option<u8>) -> u8 {
        let (comp, row, col, block) = self.index_to_coordinates(index);
        unsafe {
            let coeffs = *self.info.coef_arrays.add(comp);
            let access_fn = (*self.info.mem).access_virt_barray.unwrap();
            let rowblock = access_fn(
                self.info.as_mut() as *mut jpeg_decompress_struct as j_common_ptr,
                coeffs,
                row as mozjpeg_sys::JDIMENSION,
                1,
                write.is_some() as boolean,
            );
            let jblock = *(*rowblock).add(0);
            let coeff_ptr = jblock.add(col) as *mut i16;
            let lsb_byte = coeff_ptr.add(block) as *mut u8;
            if let Some(v) = write {
                *lsb_byte = (*lsb_byte & 0xFE) | (v & 1);
            }
            *lsb_byte
        }
    }

    /// Re-encodes the carrier, preserving quantization tables, markers and
    /// comments exactly as the original's `save_to_memory` does.
    fn encode(&mut self) -> StegResult<Vec<u8>> {
        let mut cinfo: Box<jpeg_compress_struct> = Box::new(unsafe { std::mem::zeroed() });
        let mut cerr: Box<CarrierErrorMgr> = Box::new(unsafe { std::mem::zeroed() });

        unsafe {
            jpeg_std_error(&mut cerr.pub_);
            cerr.pub_.error_exit = Some(error_exit);
            cinfo.common.err = &mut cerr.pub_;
        }

        // SAFETY: see `parse`'s note on `setjmp`. A nonzero return means
        // libjpeg hit a fatal error partway through compression; `cinfo` is
        // destroyed without inspecting its half-written state. Any
        // destination buffer libjpeg had already allocated before the fault
        // is deliberately leaked here rather than freed from a pointer whose
        // value this side of the jump can't be trusted.
        let jumped = unsafe { setjmp(&mut cerr.setjmp_buffer) };
        if jumped != 0 {
            unsafe { jpeg_destroy_compress(cinfo.as_mut()) };
            return Err(StegError::other(
                "libjpeg reported a fatal error encoding this carrier",
            ));
        }

        let mut mem_ptr: *mut u8 = std::ptr::null_mut();
        let mut mem_len: u64 = 0;

        unsafe {
            jpeg_CreateCompress(
                cinfo.as_mut(),
                JPEG_LIB_VERSION,
                std::mem::size_of::<jpeg_compress_struct>(),
            );
            cinfo.optimize_coding = true as boolean;

            jpeg_mem_dest(cinfo.as_mut(), &mut mem_ptr, &mut mem_len);

            jpeg_copy_critical_parameters(self.info.as_mut(), cinfo.as_mut());
            let coeffs = self.info.coef_arrays;
            jpeg_write_coefficients(cinfo.as_mut(), coeffs);

            let mut marker = self.info.marker_list;
            while !marker.is_null() {
                let m = *marker;
                if !m.data.is_null() && m.data_length > 0 {
                    jpeg_write_marker(cinfo.as_mut(), m.marker as c_int, m.data, m.data_length);
                }
                marker = m.next;
            }

            jpeg_finish_compress(cinfo.as_mut());

            if mem_ptr.is_null() || mem_len == 0 {
                jpeg_destroy_compress(cinfo.as_mut());
                Err(StegError::other("JPEG re-encode produced no data"))
            } else {
                let bytes = std::slice::from_raw_parts(mem_ptr, mem_len as usize).to_vec();
                jpeg_destroy_compress(cinfo.as_mut());
                libc_free(mem_ptr);
                Ok(bytes)
            }
        }
    }
}

/// `jpeg_mem_dest` allocates via the C runtime's `malloc`; free with `free`,
/// not Rust's global allocator.
fn libc_free(ptr: *mut u8) {
    unsafe {
        mozjpeg_sys::free(ptr as *mut std::os::raw::c_void);
    }
}

impl Drop for JpegCarrier {
    fn drop(&mut self) {
        unsafe {
            jpeg_destroy_decompress(self.info.as_mut());
        }
    }
}

impl crate::carrier::Carrier for JpegCarrier {
    fn size(&self) -> u64 {
        self.total_sz
    }

    fn get(&self, index: u64) -> u8 {
        // SAFETY: libjpeg's virtual array access mutates an internal cache
        // even on read, hence `&self` here requires interior mutability in
        // spirit; we model it with a local mutable alias since no carrier
        // is ever shared across threads (see the `Send` justification above).
        #[allow(invalid_reference_casting)]
        let this = unsafe { &mut *(self as *const Self as *mut Self) };
        this.access(index, None)
    }

    fn set(&mut self, index: u64, value: u8) {
        self.access(index, Some(value));
    }

    fn commit_to_memory(&mut self) -> StegResult<Vec<u8>> {
        self.encode()
    }

    /// Folds the low byte of one coefficient per block-row into an 8-byte
    /// salt, matching `jpeg.cpp`'s `salt()` loop exactly, including its
    /// `row % width_in_blocks` and `row % DCTSIZE2` index quirks.
    fn salt(&self) -> [u8; 8] {
        let mut salt = [0u8; 8];
        let mut salt_index = 0usize;
        #[allow(invalid_reference_casting)]
        let this = unsafe { &mut *(self as *const Self as *mut Self) };

        for comp in 0..self.width_in_blocks.len() {
            for row in 0..self.height_in_blocks[comp] {
                let col = row % self.width_in_blocks[comp];
                let block = row % (DCTSIZE2 as usize);
                let row_sz = (self.width_in_blocks[comp] * DCTSIZE2 as usize) as u64;
                let comp_offset: u64 = self.comp_sz[..comp].iter().sum();
                let index = comp_offset + row as u64 * row_sz + col as u64 * DCTSIZE2 as u64 + block as u64;
                let byte = this.access(index, None);
                salt[salt_index % 8] = salt[salt_index % 8].wrapping_add(byte >> 1);
                salt_index += 1;
            }
        }
        salt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_jpeg() {
        let data = vec![0u8; 64];
        assert!(JpegCarrier::parse(&data).is_err());
    }

    #[test]
    fn test_rejects_corrupt_jpeg_after_soi() {
        // Valid SOI/APP0 marker bytes followed by garbage: libjpeg gets far
        // enough to start parsing segments, then hits a fatal error and
        // calls `error_exit`, which must escape via `longjmp` rather than
        // let `jpeg_read_header` keep running on broken internal state.
        let mut data = vec![0xFFu8, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[0u8; 60]);
        let err = JpegCarrier::parse(&data).unwrap_err();
        assert!(matches!(err, StegError::InvalidCarrier(_)));
    }

    #[test]
    fn test_index_to_coordinates_stays_in_first_component() {
        // Synthetic layout check without a real decode: verifies the pure
        // arithmetic helper in isolation would need a constructed carrier,
        // so this documents the expected row_sz relation instead.
        let width_in_blocks = 4usize;
        let row_sz = width_in_blocks * DCTSIZE2 as usize;
        assert_eq!(row_sz, 4 * 64);
    }
}
