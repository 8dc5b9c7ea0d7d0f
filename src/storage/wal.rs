use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write, BufReader};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::storage::layout::StorageLayout;
use crate::core::error::Result;

// Syncs per byte volume in Batch mode
const BATCH_SYNC_BYTES: u64 = 1024 * 1024;
// Frames larger than this are treated as garbage
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;
const FRAME_HEADER_LEN: u64 = 8;

/// Write-ahead log for durability
///
/// Frame: `[len u32 LE][crc32 u32 LE][bincode(WALEntry)]`
pub struct WAL {
    pub file: File,
    pub position: u64,
    pub sync_mode: SyncMode,
    pub generation: u64,
    pub sequence: u64,
    unsynced: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Immediate,  // fsync after every write
    Batch,      // fsync periodically
    None,       // Let OS handle it
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WALEntry {
    pub sequence: u64,
    pub operation: Operation,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    Put { map: String, key: Vec<u8>, value: Vec<u8> },
    Delete { map: String, key: Vec<u8> },
}

impl WAL {
    pub fn open(storage: &StorageLayout, generation: u64, sync_mode: SyncMode) -> Result<Self> {
        let path = storage.wal_path(generation);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let position = file.metadata()?.len();

        Ok(WAL {
            file,
            position,
            sync_mode,
            generation,
            sequence: 0,
            unsynced: 0,
        })
    }

    pub fn append(&mut self, operation: Operation) -> Result<()> {
        let entry = WALEntry {
            sequence: self.sequence,
            operation,
            timestamp: Utc::now(),
        };

        let data = bincode::serialize(&entry)?;
        let len = data.len() as u32;
        let crc = crc32fast::hash(&data);

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN as usize + data.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&data);
        self.file.write_all(&frame)?;

        self.sequence += 1;
        self.position += frame.len() as u64;
        self.unsynced += frame.len() as u64;

        match self.sync_mode {
            SyncMode::Immediate => self.sync()?,
            SyncMode::Batch if self.unsynced >= BATCH_SYNC_BYTES => self.sync()?,
            _ => {}
        }

        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Read every intact entry of one generation. A torn or corrupt tail
    /// ends the replay and is cut off so later appends stay readable.
    pub fn replay(storage: &StorageLayout, generation: u64) -> Result<Vec<WALEntry>> {
        let path = storage.wal_path(generation);
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(&file);

        let mut entries = Vec::new();
        let mut valid_len = 0u64;

        loop {
            let mut header = [0u8; FRAME_HEADER_LEN as usize];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            if len > MAX_FRAME_LEN {
                warn!(path = %path.display(), offset = valid_len, "WAL frame length out of range, truncating");
                break;
            }

            let mut data = vec![0u8; len];
            if let Err(e) = reader.read_exact(&mut data) {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    warn!(path = %path.display(), offset = valid_len, "torn WAL frame, truncating");
                    break;
                }
                return Err(e.into());
            }

            if crc32fast::hash(&data) != crc {
                warn!(path = %path.display(), offset = valid_len, "WAL frame checksum mismatch, truncating");
                break;
            }

            match bincode::deserialize::<WALEntry>(&data) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(path = %path.display(), offset = valid_len, error = %e, "undecodable WAL frame, truncating");
                    break;
                }
            }
            valid_len += FRAME_HEADER_LEN + len as u64;
        }

        drop(reader);
        if valid_len < file_len {
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        Ok(entries)
    }

    pub fn remove(storage: &StorageLayout, generation: u64) -> Result<()> {
        let path = storage.wal_path(generation);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Find all WAL generations on disk, oldest first
    pub fn find_wal_files(storage: &StorageLayout) -> Result<Vec<u64>> {
        let mut generations = Vec::new();

        for entry in fs::read_dir(&storage.wal_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("log") {
                continue;
            }
            let generation = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.strip_prefix("wal_"))
                .and_then(|digits| digits.parse::<u64>().ok());
            if let Some(generation) = generation {
                generations.push(generation);
            }
        }

        generations.sort_unstable();
        Ok(generations)
    }
}
