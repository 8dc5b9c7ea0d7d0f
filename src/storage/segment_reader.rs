use std::cmp::Ordering;
use crate::core::error::{Error, Result};
use crate::mmap::mmap_file::MmapFile;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{SegmentEntry, SegmentHeader, SegmentMeta, TAG_TOMBSTONE, TAG_VALUE};

/// Read-only view of a segment file, mapped into memory.
///
/// Nothing is decoded at open besides the header. Point reads binary
/// search the sampled offsets stored after the body, then scan at most
/// one interval of entries straight from the mapping.
pub struct SegmentReader {
    pub meta: SegmentMeta,
    pub header: SegmentHeader,
    file: MmapFile,
    body_end: usize,
}

/// Sequential decoder over the segment body
pub struct EntryIterator<'a> {
    cursor: EntryCursor<'a>,
    remaining: u64,
}

struct EntryCursor<'a> {
    body: &'a [u8],
    offset: usize,
}

impl SegmentReader {
    pub fn open(storage: &StorageLayout, meta: SegmentMeta) -> Result<Self> {
        let path = storage.segment_path(&meta.id);
        let file = MmapFile::open_read_only(&path).map_err(|e| {
            Error::storage_unavailable(format!("segment {}: {}", path.display(), e))
        })?;

        let data = file.data();
        if data.len() < SegmentHeader::SIZE {
            return Err(Error::storage_unavailable(format!(
                "segment {} shorter than its header",
                path.display()
            )));
        }

        let header: SegmentHeader = bincode::deserialize(&data[..SegmentHeader::SIZE])
            .map_err(|e| Error::storage_unavailable(format!("segment {}: {}", path.display(), e)))?;

        if header.version != SegmentHeader::VERSION {
            return Err(Error::storage_unavailable(format!(
                "segment {} has incompatible version {}",
                path.display(),
                header.version
            )));
        }

        let body_end = (header.index_len as usize)
            .checked_mul(8)
            .and_then(|index_bytes| data.len().checked_sub(index_bytes))
            .filter(|end| *end >= SegmentHeader::SIZE)
            .ok_or_else(|| Error::storage_unavailable(format!(
                "segment {} too short for {} sampled offsets",
                path.display(),
                header.index_len
            )))?;

        if crc32fast::hash(&data[body_end..]) != header.index_checksum {
            return Err(Error::storage_unavailable(format!(
                "segment {} index checksum mismatch",
                path.display()
            )));
        }

        Ok(SegmentReader {
            meta,
            header,
            file,
            body_end,
        })
    }

    fn body(&self) -> &[u8] {
        &self.file.data()[SegmentHeader::SIZE..self.body_end]
    }

    /// Full scan of the body against its checksum
    pub fn verify(&self) -> Result<()> {
        if crc32fast::hash(self.body()) != self.header.body_checksum {
            return Err(Error::storage_unavailable(format!(
                "segment {} checksum mismatch",
                self.meta.id.0
            )));
        }
        Ok(())
    }

    pub fn entries(&self) -> EntryIterator<'_> {
        EntryIterator {
            cursor: EntryCursor { body: self.body(), offset: 0 },
            remaining: self.header.entry_count,
        }
    }

    /// The entry stored for `key`, deletion markers included
    pub fn get(&self, key: &[u8]) -> Result<Option<SegmentEntry<'_>>> {
        let mut cursor = EntryCursor {
            body: self.body(),
            offset: self.block_start(key)?,
        };
        while !cursor.at_end() {
            let entry = cursor.read_entry()?;
            match entry.key.cmp(key) {
                Ordering::Less => continue,
                Ordering::Equal => return Ok(Some(entry)),
                Ordering::Greater => return Ok(None),
            }
        }
        Ok(None)
    }

    /// First entry whose key sorts after `after`; the first entry overall
    /// when `after` is `None`
    pub fn seek_after(&self, after: Option<&[u8]>) -> Result<Option<SegmentEntry<'_>>> {
        let offset = match after {
            Some(key) => self.block_start(key)?,
            None => 0,
        };
        let mut cursor = EntryCursor { body: self.body(), offset };
        while !cursor.at_end() {
            let entry = cursor.read_entry()?;
            if after.is_none_or(|key| entry.key > key) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    // Offset of the last sampled entry whose key is <= target
    fn block_start(&self, target: &[u8]) -> Result<usize> {
        let (mut low, mut high) = (0usize, self.header.index_len as usize);
        while low < high {
            let mid = low + (high - low) / 2;
            let mut cursor = EntryCursor { body: self.body(), offset: self.sample(mid)? };
            if cursor.read_entry()?.key <= target {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        if low == 0 { Ok(0) } else { self.sample(low - 1) }
    }

    fn sample(&self, position: usize) -> Result<usize> {
        let start = self.body_end + position * 8;
        let raw: [u8; 8] = self.file.data()[start..start + 8]
            .try_into()
            .map_err(|_| Error::corrupt("segment index entry truncated"))?;
        let offset = u64::from_le_bytes(raw) as usize;
        if offset >= self.body().len() {
            return Err(Error::corrupt(format!(
                "segment {} index points past the body",
                self.meta.id.0
            )));
        }
        Ok(offset)
    }
}

impl<'a> EntryCursor<'a> {
    fn at_end(&self) -> bool {
        self.offset >= self.body.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.body.len())
            .ok_or_else(|| Error::corrupt("segment body ends mid-entry"))?;
        let slice = &self.body[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn take_len(&mut self) -> Result<usize> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize)
    }

    fn read_entry(&mut self) -> Result<SegmentEntry<'a>> {
        let key_len = self.take_len()?;
        let key = self.take(key_len)?;
        let tag = self.take(1)?[0];
        let value_len = self.take_len()?;
        let value = self.take(value_len)?;
        match tag {
            TAG_VALUE => Ok(SegmentEntry { key, value: Some(value) }),
            TAG_TOMBSTONE => Ok(SegmentEntry { key, value: None }),
            other => Err(Error::corrupt(format!("unknown segment entry tag {}", other))),
        }
    }
}

impl<'a> Iterator for EntryIterator<'a> {
    type Item = Result<SegmentEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let entry = self.cursor.read_entry();
        if entry.is_err() {
            self.remaining = 0;
        }
        Some(entry)
    }
}
