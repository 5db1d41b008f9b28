//! Compression codec for pages and metadata records.
//!
//! LZ4 block format with the uncompressed size prepended. Every record that
//! goes through the codec also carries its uncompressed length in the
//! surrounding metadata (anchor or locator), which the decode side checks.

use crate::error::{Error, Result};

/// Write-side compressor. Level 0 selects the fast mode; higher levels
/// select high-compression with that level.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: u32,
}

impl Compressor {
    pub fn new(level: u32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mode = if self.level == 0 {
            None
        } else {
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(
                self.level as i32,
            ))
        };
        lz4::block::compress(data, mode, true).map_err(|e| Error::Compress(e.to_string()))
    }
}

/// Decompress a record and check it against the length recorded at write
/// time.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let out = lz4::block::decompress(data, None).map_err(|e| Error::Decompress(e.to_string()))?;
    if out.len() != expected_len {
        return Err(Error::Decompress(format!(
            "expected {expected_len} bytes, got {}",
            out.len()
        )));
    }
    Ok(out)
}
