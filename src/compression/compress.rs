use serde::{Serialize, Deserialize};
use crate::core::error::{Error, Result};

/// Largest value a compressed block may expand to
pub const MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// Compressed byte block. The algorithm is not recorded in the bytes:
/// the reader must know which one the writer used.
pub struct CompressedBlock {
    pub data: Vec<u8>,
    pub compression: CompressionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    LZ4,      // Fast compression (~500 MB/s), ratio 2-3x
    Zstd,     // Better ratio (3-5x), slower (~200 MB/s)
    Snappy,   // Balanced (2-3x ratio, ~300 MB/s)
}

impl CompressedBlock {
    pub fn compress(data: &[u8], compression: CompressionType) -> Result<Self> {
        let compressed = match compression {
            CompressionType::None => data.to_vec(),

            CompressionType::LZ4 => {
                // Size prefix lets decompress() run without out-of-band length
                lz4::block::compress(data, None, true)?
            }

            CompressionType::Zstd => {
                zstd::encode_all(data, 3)?  // Level 3 is balanced
            }

            CompressionType::Snappy => {
                use snap::raw::Encoder;
                let mut encoder = Encoder::new();
                encoder.compress_vec(data)
                    .map_err(|e| Error::corrupt(format!("snappy compression failed: {}", e)))?
            }
        };

        Ok(CompressedBlock {
            data: compressed,
            compression,
        })
    }

    pub fn from_bytes(data: Vec<u8>, compression: CompressionType) -> Self {
        CompressedBlock { data, compression }
    }

    pub fn decompress(&self) -> Result<Vec<u8>> {
        match self.compression {
            CompressionType::None => Ok(self.data.clone()),

            CompressionType::LZ4 => {
                // The size prefix is untrusted: check it before allocating
                let prefix: [u8; 4] = self
                    .data
                    .get(..4)
                    .and_then(|raw| raw.try_into().ok())
                    .ok_or_else(|| Error::corrupt("lz4 block shorter than its size prefix"))?;
                let declared = u32::from_le_bytes(prefix) as usize;
                if declared > MAX_DECOMPRESSED_SIZE {
                    return Err(Error::corrupt(format!(
                        "lz4 block declares {} bytes, limit is {}",
                        declared, MAX_DECOMPRESSED_SIZE
                    )));
                }
                lz4::block::decompress(&self.data[4..], Some(declared as i32))
                    .map_err(|e| Error::corrupt(format!("lz4 block: {}", e)))
            }

            CompressionType::Zstd => {
                use std::io::Read;
                let decoder = zstd::stream::read::Decoder::new(&self.data[..])
                    .map_err(|e| Error::corrupt(format!("zstd block: {}", e)))?;
                let mut out = Vec::new();
                decoder
                    .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| Error::corrupt(format!("zstd block: {}", e)))?;
                if out.len() > MAX_DECOMPRESSED_SIZE {
                    return Err(Error::corrupt(format!(
                        "zstd block expands past {} bytes",
                        MAX_DECOMPRESSED_SIZE
                    )));
                }
                Ok(out)
            }

            CompressionType::Snappy => {
                use snap::raw::{decompress_len, Decoder};
                let declared = decompress_len(&self.data)
                    .map_err(|e| Error::corrupt(format!("snappy block: {}", e)))?;
                if declared > MAX_DECOMPRESSED_SIZE {
                    return Err(Error::corrupt(format!(
                        "snappy block declares {} bytes, limit is {}",
                        declared, MAX_DECOMPRESSED_SIZE
                    )));
                }
                let mut decoder = Decoder::new();
                decoder.decompress_vec(&self.data)
                    .map_err(|e| Error::corrupt(format!("snappy block: {}", e)))
            }
        }
    }
}
