//! # StegFS File
//!
//! Component K: the authenticated, encrypted file interface a caller
//! actually opens. Layers a seekable CTR stream cipher and an HMAC-SHA256
//! trailer over `stegfs_device::Device`, grounded on `zindosteg.cpp`'s
//! `device_interface` class (the Ruby binding this crate replaces with a
//! native Rust `Read + Write + Seek` implementation — bindings to a
//! scripting language are explicitly out of scope here).

mod mode;

pub use mode::FileMode;

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use stegfs_common::StegError;
use stegfs_crypto::{CtrStreamCipher, KeyGenerator, KeyedMac, DIGEST_SIZE};
use stegfs_device::Device;

/// Size, in bytes, of the trailing authentication tag.
const HMAC_DIGEST_SIZE: i64 = DIGEST_SIZE as i64;
/// Bytes read per chunk while computing the payload HMAC.
const HMAC_CHUNK_SIZE: usize = 0x1000;

/// Errors specific to the authenticated file layer, layering on top of the
/// lower-level `StegError` produced by the device and provider crates.
#[derive(thiserror::Error, Debug)]
pub enum FileError {
    #[error(transparent)]
    Steg(#[from] StegError),

    #[error("HMAC verification failed: wrong password or corrupted payload")]
    HmacVerificationFailed,

    #[error("file is not open for reading")]
    NotOpenForRead,

    #[error("file is not open for writing")]
    NotOpenForWrite,

    #[error("I/O operation on closed file")]
    Closed,
}

impl From<FileError> for io::Error {
    fn from(err: FileError) -> Self {
        io::Error::new(io::ErrorKind::Other, err.to_string())
    }
}

/// An authenticated, encrypted file hidden inside a carrier image.
///
/// Construction derives two independent key materials from the password:
/// a 48-byte stream key+IV (via PBKDF2 over the device's encryption salt)
/// feeding a seekable AES-CTR cipher, and the password bytes themselves as
/// an HMAC-SHA256 key authenticating the decrypted payload. Opening an
/// existing payload (anything but `"w"`/`"w+"`) verifies the trailing MAC
/// before any data becomes visible; append modes recover from a failed MAC
/// by silently starting a new, empty payload instead of failing outright.
pub struct SteganoFile {
    device: Device,
    pos: i64,
    sz: i64,
    max_sz: i64,
    encryptor: CtrStreamCipher,
    mac_key: Vec<u8>,
    mode: FileMode,
    closed: bool,
    dirty: bool,
}

impl SteganoFile {
    /// Opens a steganographic file backed by `carrier_file` on disk.
    pub fn open(carrier_file: &Path, password: &str, mode_str: &str) -> Result<Self, FileError> {
        let mode = FileMode::parse(mode_str)?;
        let device = Device::open_file(carrier_file, password, !mode.create, !mode.append)?;
        Self::from_device(device, password, mode)
    }

    /// Opens a steganographic file over an in-memory carrier image.
    pub fn open_bytes(carrier: &[u8], password: &str, mode_str: &str) -> Result<Self, FileError> {
        let mode = FileMode::parse(mode_str)?;
        let provider = stegfs_providers::load_bytes(carrier)?;
        let device = Device::new(provider, password, !mode.create, !mode.append)?;
        Self::from_device(device, password, mode)
    }

    fn from_device(device: Device, password: &str, mode: FileMode) -> Result<Self, FileError> {
        let salt = device.salt_for_encryption();
        let key_material = KeyGenerator::new(password, &salt).generate(48);
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&key_material[32..48]);
        let encryptor = CtrStreamCipher::new(&key_material[0..32], &iv)
            .map_err(|e| StegError::other(e.to_string()))?;

        let sz = device.size();
        let max_sz = (device.capacity() - HMAC_DIGEST_SIZE).max(0);

        let mut file = Self {
            device,
            pos: 0,
            sz,
            max_sz,
            encryptor,
            mac_key: password.as_bytes().to_vec(),
            mode,
            closed: false,
            dirty: false,
        };

        if !mode.create {
            file.verify_or_recover()?;
        }

        Ok(file)
    }

    fn verify_or_recover(&mut self) -> Result<(), FileError> {
        if self.sz >= HMAC_DIGEST_SIZE {
            self.sz -= HMAC_DIGEST_SIZE;

            let calculated = self.compute_hmac();

            let mut stored = [0u8; DIGEST_SIZE];
            let n = self.device.read(&mut stored);
            if n != HMAC_DIGEST_SIZE {
                return Err(FileError::HmacVerificationFailed);
            }
            let mut decrypted = [0u8; DIGEST_SIZE];
            self.encryptor.crypt(&stored, &mut decrypted, DIGEST_SIZE);

            if stegfs_crypto::verify_mac(&calculated, &decrypted) {
                tracing::debug!(size = self.sz, "payload MAC verified");
                self.seek_internal(if self.mode.append {
                    SeekFrom::End(0)
                } else {
                    SeekFrom::Start(0)
                })?;
                return Ok(());
            }

            tracing::warn!("payload MAC mismatch: wrong password or corrupted carrier");
        }

        if self.mode.append {
            tracing::warn!("append-mode open after MAC failure: discarding prior payload");
            self.device.seek(SeekFrom::Start(0))?;
            self.sz = self.device.truncate();
            self.seek_internal(SeekFrom::End(0))?;
            return Ok(());
        }

        Err(FileError::HmacVerificationFailed)
    }

    /// Computes the HMAC over the decrypted payload, from position 0 to
    /// `self.sz`. Leaves the device positioned at `self.sz` when done, same
    /// as the original.
    fn compute_hmac(&mut self) -> [u8; DIGEST_SIZE] {
        self.seek_internal(SeekFrom::Start(0)).expect("seeking to 0 cannot fail");

        let mut mac = KeyedMac::new(&self.mac_key);
        let mut buff = [0u8; HMAC_CHUNK_SIZE];
        while self.pos < self.sz {
            let to_read = (self.sz - self.pos).min(HMAC_CHUNK_SIZE as i64) as usize;
            self.device.read(&mut buff[..to_read]);
            self.pos += to_read as i64;
            self.encryptor.crypt(
                &buff[..to_read].to_vec(),
                &mut buff[..to_read],
                to_read,
            );
            mac.update(&buff[..to_read]);
        }
        mac.finalize()
    }

    fn check_closed(&self) -> Result<(), FileError> {
        if self.closed {
            Err(FileError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_read(&self) -> Result<(), FileError> {
        if !self.mode.read {
            Err(FileError::NotOpenForRead)
        } else {
            Ok(())
        }
    }

    fn check_write(&self) -> Result<(), FileError> {
        if !self.mode.write {
            Err(FileError::NotOpenForWrite)
        } else {
            Ok(())
        }
    }

    /// Seeks the device and keeps the cipher and logical position aligned.
    fn seek_internal(&mut self, pos: SeekFrom) -> Result<i64, FileError> {
        let mut newpos = self.device.seek(pos)?;
        if newpos > self.sz {
            newpos = self.device.seek(SeekFrom::Start(self.sz as u64))?;
        }
        self.encryptor.seek(newpos as u64);
        self.pos = newpos;
        Ok(self.pos)
    }

    /// Current logical offset.
    pub fn tell(&self) -> Result<i64, FileError> {
        self.check_closed()?;
        Ok(self.pos)
    }

    /// Logical payload size (excluding the authentication trailer).
    pub fn size(&self) -> i64 {
        self.sz
    }

    /// Maximum payload size this carrier can hold.
    pub fn capacity(&self) -> i64 {
        self.max_sz
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.sz
    }

    /// Reads up to `buf.len()` decrypted bytes, advancing the cursor.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileError> {
        self.check_closed()?;
        self.check_read()?;

        if self.pos > self.sz {
            self.pos = self.sz;
        }
        let to_read = (self.sz - self.pos).max(0).min(buf.len() as i64) as usize;
        if to_read == 0 {
            return Ok(0);
        }
        let n = self.device.read(&mut buf[..to_read]) as usize;
        self.encryptor.crypt(&buf[..n].to_vec(), &mut buf[..n], n);
        self.pos += n as i64;
        Ok(n)
    }

    /// Reads exactly `self.sz - self.pos` remaining bytes.
    pub fn read_to_end_owned(&mut self) -> Result<Vec<u8>, FileError> {
        self.check_closed()?;
        self.check_read()?;
        let remaining = (self.sz - self.pos).max(0) as usize;
        let mut out = vec![0u8; remaining];
        let n = self.read(&mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Writes `data`, encrypting as it goes. Matches the original's quirk
    /// of marking the file dirty even when zero bytes actually get written
    /// (e.g. writing to a file already at capacity) — see DESIGN.md.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, FileError> {
        self.check_closed()?;
        self.check_write()?;
        if self.mode.append {
            self.seek_internal(SeekFrom::End(0))?;
        }

        let mut len = data.len() as i64;
        if self.pos > self.sz {
            self.pos = self.sz;
        }
        if self.pos + len > self.max_sz {
            len = self.max_sz - self.pos;
        }

        let start = self.pos;
        let mut written = 0i64;
        let mut idx = 0usize;
        while written < len {
            let mut c = [0u8; 1];
            self.encryptor.crypt(&data[idx..idx + 1], &mut c, 1);
            if self.device.write(&c) != 1 {
                break;
            }
            self.pos += 1;
            written += 1;
            idx += 1;
        }
        if self.pos > self.sz {
            self.sz = self.pos;
        }
        self.dirty = true;

        Ok((self.pos - start) as usize)
    }

    /// Seeks within `[0, max_sz]`, clamping forward overseeks to the
    /// current logical size (the device itself clamps to `max_sz`; this
    /// layer re-clamps to `sz` so callers never seek into the MAC trailer).
    pub fn seek(&mut self, pos: SeekFrom) -> Result<i64, FileError> {
        self.check_closed()?;
        self.seek_internal(pos)
    }

    /// Truncates the payload to the current position.
    pub fn truncate(&mut self) -> Result<(), FileError> {
        self.check_closed()?;
        self.check_write()?;
        self.truncate_to(self.pos)
    }

    pub fn truncate_to(&mut self, mut size: i64) -> Result<(), FileError> {
        self.check_closed()?;
        self.check_write()?;
        if size == self.sz {
            return Ok(());
        }
        if size > self.max_sz {
            size = self.max_sz;
        }

        if size != self.pos {
            self.device.seek(SeekFrom::Start(size as u64))?;
            self.sz = self.device.truncate();
            if self.pos > self.sz {
                self.pos = self.sz;
            }
            self.seek_internal(SeekFrom::Start(self.pos as u64))?;
        } else {
            self.sz = self.device.truncate();
        }
        self.dirty = true;
        Ok(())
    }

    /// Recomputes and writes the trailing HMAC, then restores the caller's
    /// position. A no-op when nothing has changed since the last flush.
    pub fn flush(&mut self) -> Result<(), FileError> {
        self.check_closed()?;
        let orig = self.pos;
        if self.dirty {
            let digest = self.compute_hmac();
            let mut encrypted = [0u8; DIGEST_SIZE];
            self.encryptor.crypt(&digest, &mut encrypted, DIGEST_SIZE);
            self.device.write(&encrypted);
        }
        self.device.flush()?;
        self.dirty = false;
        self.seek_internal(SeekFrom::Start(orig as u64))?;
        Ok(())
    }

    /// Flushes pending changes and marks the file closed.
    pub fn close(&mut self) -> Result<(), FileError> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.device.close()?;
        self.closed = true;
        Ok(())
    }

    /// Writes the carrier's current bytes to `path`.
    pub fn save_to_file(&mut self, path: &Path) -> Result<(), FileError> {
        self.flush()?;
        self.device.write_to_file(path)?;
        Ok(())
    }

    /// Serializes the carrier's current bytes into memory.
    pub fn save_to_memory(&mut self) -> Result<Vec<u8>, FileError> {
        self.flush()?;
        let bytes = self.device.write_to_memory()?;
        Ok(bytes)
    }
}

impl Drop for SteganoFile {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Read for SteganoFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        SteganoFile::read(self, buf).map_err(io::Error::from)
    }
}

impl Write for SteganoFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SteganoFile::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        SteganoFile::flush(self).map_err(io::Error::from)
    }
}

impl Seek for SteganoFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        SteganoFile::seek(self, pos)
            .map(|p| p as u64)
            .map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_carrier_bytes(rows: u32) -> Vec<u8> {
        let width = 8u32;
        let row_sz = (width as usize * 3 + 3) / 4 * 4;
        let file_size = 54 + row_sz * rows as usize;
        let mut f = vec![0u8; file_size];
        f[0] = b'B';
        f[1] = b'M';
        f[2..6].copy_from_slice(&(file_size as u32).to_le_bytes());
        f[10..14].copy_from_slice(&54u32.to_le_bytes());
        f[14..18].copy_from_slice(&40u32.to_le_bytes());
        f[18..22].copy_from_slice(&width.to_le_bytes());
        f[22..26].copy_from_slice(&rows.to_le_bytes());
        f[26..28].copy_from_slice(&1u16.to_le_bytes());
        f[28..30].copy_from_slice(&24u16.to_le_bytes());
        for (i, b) in f[54..].iter_mut().enumerate() {
            *b = (i * 61) as u8;
        }
        f
    }

    #[test]
    fn test_write_read_roundtrip_through_reopen() {
        let carrier = make_carrier_bytes(800);
        let mut f = SteganoFile::open_bytes(&carrier, "hunter2", "w+").unwrap();
        f.write(b"hello, hidden world").unwrap();
        let bytes = f.save_to_memory().unwrap();

        let mut f2 = SteganoFile::open_bytes(&bytes, "hunter2", "r").unwrap();
        let mut out = vec![0u8; "hello, hidden world".len()];
        let n = f2.read(&mut out).unwrap();
        assert_eq!(n, out.len());
        assert_eq!(&out, b"hello, hidden world");
    }

    #[test]
    fn test_wrong_password_fails_hmac_verification() {
        let carrier = make_carrier_bytes(800);
        let mut f = SteganoFile::open_bytes(&carrier, "hunter2", "w+").unwrap();
        f.write(b"top secret").unwrap();
        let bytes = f.save_to_memory().unwrap();

        let err = SteganoFile::open_bytes(&bytes, "wrong-password", "r").unwrap_err();
        assert!(matches!(err, FileError::HmacVerificationFailed));
    }

    #[test]
    fn test_append_mode_recovers_from_bad_hmac_instead_of_failing() {
        let carrier = make_carrier_bytes(800);
        let mut f = SteganoFile::open_bytes(&carrier, "hunter2", "w+").unwrap();
        f.write(b"original payload").unwrap();
        let bytes = f.save_to_memory().unwrap();

        // Wrong password in append mode must not error — it starts fresh.
        let mut f2 = SteganoFile::open_bytes(&bytes, "wrong-password", "a+").unwrap();
        assert_eq!(f2.size(), 0);
        f2.write(b"new").unwrap();
        assert_eq!(f2.size(), 3);
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let carrier = make_carrier_bytes(800);
        let mut f = SteganoFile::open_bytes(&carrier, "hunter2", "w+").unwrap();
        f.write(b"do not tamper with me").unwrap();
        let mut bytes = f.save_to_memory().unwrap();

        // Flip a single LSB-bearing pixel byte somewhere in the carrier.
        bytes[60] ^= 1;

        let err = SteganoFile::open_bytes(&bytes, "hunter2", "r").unwrap_err();
        assert!(matches!(err, FileError::HmacVerificationFailed));
    }

    #[test]
    fn test_append_extends_past_previous_end() {
        let carrier = make_carrier_bytes(800);
        let mut f = SteganoFile::open_bytes(&carrier, "hunter2", "w+").unwrap();
        f.write(b"first").unwrap();
        let bytes = f.save_to_memory().unwrap();

        let mut f2 = SteganoFile::open_bytes(&bytes, "hunter2", "a+").unwrap();
        f2.write(b"-second").unwrap();
        let bytes2 = f2.save_to_memory().unwrap();

        let mut f3 = SteganoFile::open_bytes(&bytes2, "hunter2", "r").unwrap();
        let out = f3.read_to_end_owned().unwrap();
        assert_eq!(&out, b"first-second");
    }

    #[test]
    fn test_read_only_mode_rejects_write() {
        let carrier = make_carrier_bytes(800);
        let mut f = SteganoFile::open_bytes(&carrier, "hunter2", "w+").unwrap();
        f.write(b"data").unwrap();
        let bytes = f.save_to_memory().unwrap();

        let mut f2 = SteganoFile::open_bytes(&bytes, "hunter2", "r").unwrap();
        let err = f2.write(b"nope").unwrap_err();
        assert!(matches!(err, FileError::NotOpenForWrite));
    }

    #[test]
    fn test_truncate_shrinks_payload() {
        let carrier = make_carrier_bytes(800);
        let mut f = SteganoFile::open_bytes(&carrier, "hunter2", "w+").unwrap();
        f.write(b"0123456789").unwrap();
        f.seek(SeekFrom::Start(4)).unwrap();
        f.truncate().unwrap();
        assert_eq!(f.size(), 4);
    }
}
