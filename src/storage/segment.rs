use uuid::Uuid;
use serde::{Deserialize, Serialize};

/// Unique segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        SegmentId(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

/// One persisted segment as the checkpoint records it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub id: SegmentId,
    pub entry_count: u64,
    pub size_bytes: u64,
}

/// Every sampled entry in a segment is this many entries apart
pub const INDEX_INTERVAL: u64 = 32;

/// One decoded entry; `value` is `None` for a deletion marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEntry<'a> {
    pub key: &'a [u8],
    pub value: Option<&'a [u8]>,
}

pub(crate) const TAG_VALUE: u8 = 0;
pub(crate) const TAG_TOMBSTONE: u8 = 1;

/// Segment file header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub version: u32,        // Format version
    pub entry_count: u64,    // Entries, deletion markers included
    pub index_len: u64,      // Sampled offsets stored after the body
    pub body_checksum: u32,  // CRC32 of the entries
    pub index_checksum: u32, // CRC32 of the sampled offsets
}

impl SegmentHeader {
    pub const VERSION: u32 = 2;
    pub const SIZE: usize = 28; // bincode fixed-int encoding of the five fields

    pub fn new(entry_count: u64, index_len: u64) -> Self {
        SegmentHeader {
            version: Self::VERSION,
            entry_count,
            index_len,
            body_checksum: 0,
            index_checksum: 0,
        }
    }
}
