use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;
use crate::compression::compress::{CompressedBlock, CompressionType};
use crate::core::error::{Error, Result};

/// Leading byte of every encoded record.
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// How the values of one index are stored. Declared when the index is
/// opened and persisted with it; never inferred from the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredForm {
    Plain,
    Compressed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Algorithm applied to indices declared as `StoredForm::Compressed`.
    pub compression: CompressionType,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            compression: CompressionType::Snappy,
        }
    }
}

/// Record serializer shared by every store of the process.
///
/// Layout: `[RECORD_FORMAT_VERSION][bincode payload]`, optionally wrapped
/// by the configured compression.
#[derive(Debug, Clone)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Codec { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn encode<T: Serialize>(&self, record: &T) -> Result<Vec<u8>> {
        let mut out = vec![RECORD_FORMAT_VERSION];
        bincode::serialize_into(&mut out, record)?;
        Ok(out)
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match bytes.split_first() {
            None => Err(Error::corrupt("empty record")),
            Some((&version, _)) if version != RECORD_FORMAT_VERSION => {
                Err(Error::corrupt(format!("unknown record format version {}", version)))
            }
            Some((_, payload)) => bincode::deserialize(payload)
                .map_err(|e| Error::corrupt(format!("truncated or malformed record: {}", e))),
        }
    }

    pub fn encode_compressed<T: Serialize>(&self, record: &T) -> Result<Vec<u8>> {
        let encoded = self.encode(record)?;
        Ok(CompressedBlock::compress(&encoded, self.config.compression)?.data)
    }

    pub fn decode_compressed<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        if bytes.is_empty() {
            return Err(Error::corrupt("empty record"));
        }
        let block = CompressedBlock::from_bytes(bytes.to_vec(), self.config.compression);
        self.decode(&block.decompress()?)
    }

    pub fn encode_as<T: Serialize>(&self, record: &T, form: StoredForm) -> Result<Vec<u8>> {
        match form {
            StoredForm::Plain => self.encode(record),
            StoredForm::Compressed => self.encode_compressed(record),
        }
    }

    pub fn decode_as<T: DeserializeOwned>(&self, bytes: &[u8], form: StoredForm) -> Result<T> {
        match form {
            StoredForm::Plain => self.decode(bytes),
            StoredForm::Compressed => self.decode_compressed(bytes),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(CodecConfig::default())
    }
}
