use std::io::{BufWriter, Seek, SeekFrom, Write};
use crc32fast::Hasher;
use tempfile::NamedTempFile;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{
    SegmentHeader, SegmentId, SegmentMeta, INDEX_INTERVAL, TAG_TOMBSTONE, TAG_VALUE,
};
use crate::core::error::{Error, Result};

/// Writes sorted entries to a fresh segment file.
///
/// Keys must arrive in strictly ascending order. The file is built under
/// a temporary name and only renamed into place once the header carries
/// the final checksums; dropping an unfinished writer leaves nothing
/// behind.
pub struct SegmentWriter {
    pub segment_id: SegmentId,
    pub entry_count: u64,
    offset: u64,
    samples: Vec<u64>,
    file: BufWriter<NamedTempFile>,
    hasher: Hasher,
}

impl SegmentWriter {
    pub fn new(storage: &StorageLayout) -> Result<Self> {
        let mut file = BufWriter::new(NamedTempFile::new_in(&storage.segments_dir)?);
        // Placeholder header, rewritten by finish()
        file.write_all(&[0u8; SegmentHeader::SIZE])?;

        Ok(SegmentWriter {
            segment_id: SegmentId::new(),
            entry_count: 0,
            offset: 0,
            samples: Vec::new(),
            file,
            hasher: Hasher::new(),
        })
    }

    // [ klen u32 ][ key ][ tag u8 ][ vlen u32 ][ value ]
    pub fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if self.entry_count % INDEX_INTERVAL == 0 {
            self.samples.push(self.offset);
        }

        let (tag, value) = match value {
            Some(value) => (TAG_VALUE, value),
            None => (TAG_TOMBSTONE, &[][..]),
        };
        let mut buffer = Vec::with_capacity(9 + key.len() + value.len());
        buffer.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buffer.extend_from_slice(key);
        buffer.push(tag);
        buffer.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buffer.extend_from_slice(value);

        self.hasher.update(&buffer);
        self.file.write_all(&buffer)?;
        self.offset += buffer.len() as u64;
        self.entry_count += 1;
        Ok(())
    }

    // [ HEADER ] <- byte 0
    // [ ENTRY 1 ] ... [ ENTRY n ]
    // [ offset of entry 0, 32, 64, ... as u64 ]
    pub fn finish(mut self, storage: &StorageLayout) -> Result<SegmentMeta> {
        let mut index = Vec::with_capacity(self.samples.len() * 8);
        for sample in &self.samples {
            index.extend_from_slice(&sample.to_le_bytes());
        }
        self.file.write_all(&index)?;

        let mut header = SegmentHeader::new(self.entry_count, self.samples.len() as u64);
        header.body_checksum = self.hasher.finalize();
        header.index_checksum = crc32fast::hash(&index);
        let header_data = bincode::serialize(&header)?;

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header_data)?;

        let file = self
            .file
            .into_inner()
            .map_err(|e| Error::from(e.into_error()))?;
        file.as_file().sync_all()?;
        file.persist(storage.segment_path(&self.segment_id))
            .map_err(|e| Error::from(e.error))?;

        Ok(SegmentMeta {
            id: self.segment_id,
            entry_count: self.entry_count,
            size_bytes: SegmentHeader::SIZE as u64 + self.offset + index.len() as u64,
        })
    }
}
