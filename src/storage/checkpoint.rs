use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{info, warn};
use crate::codec::record_codec::StoredForm;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{SegmentId, SegmentMeta};
use crate::storage::wal::{Operation, WAL};
use crate::core::error::{Error, Result};

pub const STORAGE_FORMAT_VERSION: u32 = 2;

/// Declared maps of one environment and how their values are stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub maps: BTreeMap<String, StoredForm>,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    pub fn new() -> Self {
        Manifest {
            format_version: STORAGE_FORMAT_VERSION,
            maps: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn load(storage: &StorageLayout) -> Result<Option<Self>> {
        let manifest: Option<Manifest> = load_meta(&storage.manifest_path())?;
        if let Some(manifest) = &manifest {
            if manifest.format_version != STORAGE_FORMAT_VERSION {
                return Err(Error::storage_unavailable(format!(
                    "{} uses storage format {}, expected {}",
                    storage.base_dir.display(),
                    manifest.format_version,
                    STORAGE_FORMAT_VERSION
                )));
            }
        }
        Ok(manifest)
    }

    /// Add a map declaration. An existing map must keep its stored form.
    pub fn declare(&mut self, name: &str, form: StoredForm) -> Result<bool> {
        match self.maps.get(name) {
            Some(existing) if *existing != form => Err(Error::storage_unavailable(format!(
                "map {} is stored as {:?}, opened as {:?}",
                name, existing, form
            ))),
            Some(_) => Ok(false),
            None => {
                self.maps.insert(name.to_string(), form);
                Ok(true)
            }
        }
    }

    pub fn save(&self, storage: &StorageLayout) -> Result<()> {
        save_meta(storage, &storage.manifest_path(), self)
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted layers of one map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapCheckpoint {
    /// Newest first
    pub segments: Vec<SegmentMeta>,
    pub live_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    /// First WAL generation not covered by the segments
    pub wal_generation: u64,
    pub maps: BTreeMap<String, MapCheckpoint>,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn empty() -> Self {
        Checkpoint {
            format_version: STORAGE_FORMAT_VERSION,
            wal_generation: 0,
            maps: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Every segment the checkpoint keeps alive
    pub fn referenced_segments(&self) -> HashSet<SegmentId> {
        self.maps
            .values()
            .flat_map(|map| map.segments.iter().map(|segment| segment.id))
            .collect()
    }

    /// Load checkpoint from disk
    pub fn load(storage: &StorageLayout) -> Result<Option<Self>> {
        let checkpoint: Option<Checkpoint> = load_meta(&storage.checkpoint_path())?;
        if let Some(checkpoint) = &checkpoint {
            if checkpoint.format_version != STORAGE_FORMAT_VERSION {
                return Err(Error::storage_unavailable(format!(
                    "checkpoint of {} has format {}",
                    storage.base_dir.display(),
                    checkpoint.format_version
                )));
            }
        }
        Ok(checkpoint)
    }

    /// Save checkpoint to disk
    pub fn save(&self, storage: &StorageLayout) -> Result<()> {
        save_meta(storage, &storage.checkpoint_path(), self)
    }
}

/// WAL operations still to apply on top of the checkpointed segments
pub struct Recovery {
    pub operations: Vec<Operation>,
    /// Generation new writes append to
    pub generation: u64,
}

pub struct RecoveryManager;

impl RecoveryManager {
    pub fn recover(storage: &StorageLayout, checkpoint: &Checkpoint) -> Result<Recovery> {
        let mut operations = Vec::new();
        let mut generation = checkpoint.wal_generation;

        for found in WAL::find_wal_files(storage)? {
            if found < checkpoint.wal_generation {
                // Superseded by the checkpoint but not yet deleted
                warn!(generation = found, "removing WAL generation older than checkpoint");
                WAL::remove(storage, found)?;
                continue;
            }
            let entries = WAL::replay(storage, found)?;
            operations.extend(entries.into_iter().map(|entry| entry.operation));
            generation = found;
        }

        if !operations.is_empty() {
            info!(
                path = %storage.base_dir.display(),
                operations = operations.len(),
                checkpoint = %checkpoint.timestamp,
                "replayed write-ahead log"
            );
        }

        Ok(Recovery { operations, generation })
    }
}

fn load_meta<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read(path)
        .map_err(|e| Error::storage_unavailable(format!("{}: {}", path.display(), e)))?;
    let value = bincode::deserialize(&data)
        .map_err(|e| Error::storage_unavailable(format!("{} unreadable: {}", path.display(), e)))?;
    Ok(Some(value))
}

// Written beside the target and renamed, so a crash leaves the old file intact
fn save_meta<T: Serialize>(storage: &StorageLayout, path: &Path, value: &T) -> Result<()> {
    let data = bincode::serialize(value)?;
    let mut file = NamedTempFile::new_in(&storage.meta_dir)?;
    file.write_all(&data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| Error::from(e.error))?;
    Ok(())
}
