//! # StegFS Providers
//!
//! Components F-I: the carrier abstraction (`Carrier`, `AnyCarrier`) and its
//! three codec implementations — BMP, PNG and JPEG. Grounded on
//! `ext/zindosteg/provider.h` and the corresponding per-format `.cpp`/`.h`
//! pairs in the same directory.

pub mod bmp;
pub mod carrier;
pub mod jpeg;
pub mod png;

pub use bmp::BmpCarrier;
pub use carrier::{load_bytes, load_file, AnyCarrier, Carrier};
pub use jpeg::JpegCarrier;
pub use png::PngCarrier;
