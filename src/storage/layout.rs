use std::path::{Path, PathBuf};
use std::fs;
use crate::core::error::{Error, Result};
use crate::storage::segment::SegmentId;

/// Directory structure of one storage environment
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory
    pub segments_dir: PathBuf,  // Map snapshots (.seg files)
    pub wal_dir: PathBuf,       // Write-ahead log location
    pub meta_dir: PathBuf,      // Manifest and checkpoint
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let segments_dir = base_dir.join("segments");
        let wal_dir = base_dir.join("wal");
        let meta_dir = base_dir.join("meta");

        for dir in [&segments_dir, &wal_dir, &meta_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                Error::storage_unavailable(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }

        Ok(StorageLayout {
            base_dir,
            segments_dir,
            wal_dir,
            meta_dir,
        })
    }

    pub fn segment_path(&self, id: &SegmentId) -> PathBuf {
        self.segments_dir.join(format!("{}.seg", id.0))
    }

    pub fn wal_path(&self, generation: u64) -> PathBuf {
        self.wal_dir.join(format!("wal_{:08}.log", generation))
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.meta_dir.join("checkpoint.bin")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.meta_dir.join("manifest.bin")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
