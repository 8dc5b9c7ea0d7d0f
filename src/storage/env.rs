use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::codec::record_codec::{Codec, StoredForm};
use crate::core::error::{Error, Result};
use crate::storage::checkpoint::{Checkpoint, Manifest, MapCheckpoint, RecoveryManager};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::map::MapCore;
use crate::storage::merge_policy::{MergePolicy, TieredMergePolicy};
use crate::storage::segment::{SegmentEntry, SegmentId};
use crate::storage::segment_reader::SegmentReader;
use crate::storage::segment_writer::SegmentWriter;
use crate::storage::typed::{Index, IndexKey};
use crate::storage::wal::{Operation, SyncMode, WAL};

/// Name and stored form of one map, declared at open time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub form: StoredForm,
}

impl IndexSpec {
    pub fn plain(name: &str) -> Self {
        IndexSpec { name: name.to_string(), form: StoredForm::Plain }
    }

    pub fn compressed(name: &str) -> Self {
        IndexSpec { name: name.to_string(), form: StoredForm::Compressed }
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub sync_mode: SyncMode,
    /// Checkpoint once the active WAL grows past this many bytes
    pub wal_compaction_bytes: u64,
    /// Applied to each map after its memtable is flushed
    pub merge_policy: TieredMergePolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            sync_mode: SyncMode::Batch,
            wal_compaction_bytes: 256 * 1024 * 1024,
            merge_policy: TieredMergePolicy::default(),
        }
    }
}

struct WriterState {
    wal: WAL,
    checkpoint: Checkpoint,
}

pub(crate) struct StoreShared {
    layout: StorageLayout,
    pub(crate) codec: Arc<Codec>,
    maps: HashMap<String, Arc<MapCore>>,
    writer: Mutex<WriterState>,
    closed: AtomicBool,
    lock: Mutex<Option<FileLock>>,
    merge_policy: Box<dyn MergePolicy>,
    options: StoreOptions,
}

/// Handle on one storage environment (one directory, a fixed set of
/// named maps). Cloning shares the environment.
#[derive(Clone)]
pub struct IndexStore {
    shared: Arc<StoreShared>,
}

impl IndexStore {
    pub fn open(
        directory: impl Into<PathBuf>,
        specs: &[IndexSpec],
        codec: Arc<Codec>,
        options: StoreOptions,
    ) -> Result<Self> {
        let directory = directory.into();
        let layout = StorageLayout::new(directory.clone())?;
        let lock = FileLock::acquire(&layout)?;

        let mut manifest = Manifest::load(&layout)?.unwrap_or_default();
        let mut declared_new = false;
        for spec in specs {
            declared_new |= manifest.declare(&spec.name, spec.form)?;
        }
        if declared_new {
            manifest.save(&layout).map_err(|e| unavailable(&directory, e))?;
        }

        let checkpoint = Checkpoint::load(&layout)?.unwrap_or_else(Checkpoint::empty);
        remove_stray_segments(&layout, &checkpoint.referenced_segments())
            .map_err(|e| unavailable(&directory, e))?;

        // Segments are mapped, not read: open cost does not grow with the data
        let mut maps = HashMap::with_capacity(specs.len());
        for spec in specs {
            let core = match checkpoint.maps.get(&spec.name) {
                Some(persisted) => {
                    let segments = persisted
                        .segments
                        .iter()
                        .map(|meta| SegmentReader::open(&layout, *meta).map(Arc::new))
                        .collect::<Result<Vec<_>>>()?;
                    MapCore::open(&spec.name, spec.form, segments, persisted.live_count)
                }
                None => MapCore::new(&spec.name, spec.form),
            };
            maps.insert(spec.name.clone(), Arc::new(core));
        }

        let recovery = RecoveryManager::recover(&layout, &checkpoint)
            .map_err(|e| unavailable(&directory, e))?;
        let replayed = recovery.operations.len();
        for operation in recovery.operations {
            apply(&maps, operation).map_err(|e| unavailable(&directory, e))?;
        }

        let mut wal = WAL::open(&layout, recovery.generation, options.sync_mode)
            .map_err(|e| unavailable(&directory, e))?;
        wal.sequence = replayed as u64;

        info!(
            path = %directory.display(),
            maps = maps.len(),
            replayed,
            "opened index store"
        );

        Ok(IndexStore {
            shared: Arc::new(StoreShared {
                layout,
                codec,
                maps,
                writer: Mutex::new(WriterState { wal, checkpoint }),
                closed: AtomicBool::new(false),
                lock: Mutex::new(Some(lock)),
                merge_policy: Box::new(options.merge_policy.clone()),
                options,
            }),
        })
    }

    /// Typed accessor; every call for the same name shares one map
    pub fn map<K: IndexKey, V: Serialize + DeserializeOwned>(&self, name: &str) -> Result<Index<K, V>> {
        self.ensure_open()?;
        let core = self.core(name)?;
        Ok(Index::new(self.clone(), core))
    }

    pub fn path(&self) -> &Path {
        self.shared.layout.base_dir()
    }

    pub fn codec(&self) -> &Codec {
        &self.shared.codec
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::storage_closed(format!(
                "store {} is closed",
                self.path().display()
            )));
        }
        Ok(())
    }

    pub(crate) fn core(&self, name: &str) -> Result<Arc<MapCore>> {
        self.shared
            .maps
            .get(name)
            .cloned()
            .ok_or_else(|| Error::invalid_argument(format!(
                "map {} is not declared in {}",
                name,
                self.path().display()
            )))
    }

    pub(crate) fn get_raw(&self, core: &MapCore, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        core.get(key)
    }

    pub(crate) fn put_raw(&self, core: &MapCore, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut writer = self.shared.writer.lock();
        // Checked under the writer lock so nothing lands after close()
        self.ensure_open()?;

        writer.wal.append(Operation::Put {
            map: core.name.clone(),
            key: key.clone(),
            value: value.clone(),
        })?;
        core.insert(key, value)?;
        self.maybe_compact(&mut writer)
    }

    pub(crate) fn delete_raw(&self, core: &MapCore, key: Vec<u8>) -> Result<bool> {
        let mut writer = self.shared.writer.lock();
        self.ensure_open()?;

        if !core.contains(&key)? {
            return Ok(false);
        }
        writer.wal.append(Operation::Delete {
            map: core.name.clone(),
            key: key.clone(),
        })?;
        core.remove(&key)?;
        self.maybe_compact(&mut writer)?;
        Ok(true)
    }

    /// Make every acknowledged write durable
    pub fn flush(&self) -> Result<()> {
        let mut writer = self.shared.writer.lock();
        self.ensure_open()?;
        writer.wal.sync()
    }

    /// Flush every memtable to a new segment, merge segments the policy
    /// selects and start a fresh WAL
    pub fn checkpoint(&self) -> Result<()> {
        let mut writer = self.shared.writer.lock();
        self.ensure_open()?;
        self.checkpoint_locked(&mut writer)
    }

    /// Entry count per map, without decoding any value
    pub fn counts(&self) -> Result<BTreeMap<String, u64>> {
        self.ensure_open()?;
        Ok(self
            .shared
            .maps
            .iter()
            .map(|(name, core)| (name.clone(), core.len()))
            .collect())
    }

    /// Checkpoint, release the directory lock, the memtables and the
    /// segment mappings.
    /// Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut writer = self.shared.writer.lock();
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let result = self.checkpoint_locked(&mut writer);
        for core in self.shared.maps.values() {
            core.release();
        }
        self.shared.lock.lock().take();

        info!(path = %self.path().display(), "closed index store");
        result
    }

    fn maybe_compact(&self, writer: &mut WriterState) -> Result<()> {
        if writer.wal.position >= self.shared.options.wal_compaction_bytes {
            debug!(
                path = %self.path().display(),
                wal_bytes = writer.wal.position,
                "WAL past compaction threshold"
            );
            self.checkpoint_locked(writer)?;
        }
        Ok(())
    }

    fn checkpoint_locked(&self, writer: &mut WriterState) -> Result<()> {
        let layout = &self.shared.layout;
        let mut maps = writer.checkpoint.maps.clone();
        let mut superseded = Vec::new();
        let mut flushed = 0;
        let mut merged = 0;

        let mut names: Vec<&String> = self.shared.maps.keys().collect();
        names.sort();
        for name in names {
            let core = &self.shared.maps[name];
            if core.is_dirty() {
                core.install_flushed(flush_memtable(layout, core)?);
                flushed += 1;
            }
            if let Some(run) = self.shared.merge_policy.select_segments_to_merge(&core.segment_metas()) {
                superseded.extend(merge_segments(layout, core, run)?);
                merged += 1;
            }
            maps.insert(name.clone(), MapCheckpoint {
                segments: core.segment_metas(),
                live_count: core.len(),
            });
        }

        let old_generation = writer.wal.generation;
        let new_generation = old_generation + 1;
        writer.wal.sync()?;
        let new_wal = WAL::open(layout, new_generation, self.shared.options.sync_mode)?;

        let checkpoint = Checkpoint {
            wal_generation: new_generation,
            maps,
            timestamp: Utc::now(),
            ..Checkpoint::empty()
        };
        checkpoint.save(layout)?;

        writer.wal = new_wal;
        writer.checkpoint = checkpoint;

        WAL::remove(layout, old_generation)?;
        // Open iterators keep their mappings; the files can go
        for id in superseded {
            let path = layout.segment_path(&id);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "could not remove superseded segment");
            }
        }

        info!(
            path = %self.path().display(),
            maps_flushed = flushed,
            merges = merged,
            wal_generation = new_generation,
            "checkpoint complete"
        );
        Ok(())
    }
}

impl Drop for StoreShared {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            if let Err(e) = self.writer.get_mut().wal.sync() {
                warn!(path = %self.layout.base_dir.display(), error = %e, "WAL sync on drop failed");
            }
        }
    }
}

/// Write the memtable as a new segment. `None` when nothing needs one.
fn flush_memtable(layout: &StorageLayout, core: &MapCore) -> Result<Option<Arc<SegmentReader>>> {
    let state = core.snapshot();
    // Without older segments a deletion has nothing to shadow
    let keep_tombstones = !state.segments.is_empty();

    let mut segment_writer = SegmentWriter::new(layout)?;
    for (key, slot) in &state.memtable {
        if slot.is_some() || keep_tombstones {
            segment_writer.write_entry(key, slot.as_deref())?;
        }
    }
    if segment_writer.entry_count == 0 {
        return Ok(None);
    }

    let meta = segment_writer.finish(layout)?;
    debug!(map = %core.name, entries = meta.entry_count, bytes = meta.size_bytes, "memtable flushed");
    Ok(Some(Arc::new(SegmentReader::open(layout, meta)?)))
}

/// Merge the `run` newest segments of a map into one and return the ids
/// it supersedes
fn merge_segments(layout: &StorageLayout, core: &MapCore, run: usize) -> Result<Vec<SegmentId>> {
    let state = core.snapshot();
    let inputs = &state.segments[..run.min(state.segments.len())];
    // Deletion markers matter only while an older segment remains below
    let drop_tombstones = inputs.len() == state.segments.len();
    for segment in inputs {
        segment.verify()?;
    }

    let mut sources: Vec<_> = inputs.iter().map(|segment| segment.entries()).collect();
    let mut heads: Vec<Option<SegmentEntry<'_>>> = sources
        .iter_mut()
        .map(|source| source.next().transpose())
        .collect::<Result<_>>()?;

    let mut segment_writer = SegmentWriter::new(layout)?;
    loop {
        // Smallest head key; on a tie the newer input wins
        let mut next: Option<SegmentEntry<'_>> = None;
        for entry in heads.iter().flatten() {
            if next.is_none_or(|best| entry.key < best.key) {
                next = Some(*entry);
            }
        }
        let Some(entry) = next else { break };

        if entry.value.is_some() || !drop_tombstones {
            segment_writer.write_entry(entry.key, entry.value)?;
        }
        for (head, source) in heads.iter_mut().zip(sources.iter_mut()) {
            if head.is_some_and(|current| current.key == entry.key) {
                *head = source.next().transpose()?;
            }
        }
    }

    let merged = if segment_writer.entry_count == 0 {
        None
    } else {
        let meta = segment_writer.finish(layout)?;
        Some(Arc::new(SegmentReader::open(layout, meta)?))
    };

    debug!(
        map = %core.name,
        inputs = inputs.len(),
        entries = merged.as_ref().map_or(0, |segment| segment.meta.entry_count),
        "segments merged"
    );
    let superseded = inputs.iter().map(|segment| segment.meta.id).collect();
    core.install_merged(inputs.len(), merged);
    Ok(superseded)
}

/// Delete segment files no checkpoint refers to, left behind by an
/// interrupted checkpoint or merge
fn remove_stray_segments(layout: &StorageLayout, referenced: &HashSet<SegmentId>) -> Result<()> {
    for entry in fs::read_dir(&layout.segments_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let known = path.extension().is_some_and(|ext| ext == "seg")
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
                .is_some_and(|id| referenced.contains(&SegmentId(id)));
        if known {
            continue;
        }

        warn!(path = %path.display(), "removing segment file not referenced by the checkpoint");
        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "could not remove stray segment");
        }
    }
    Ok(())
}

fn apply(maps: &HashMap<String, Arc<MapCore>>, operation: Operation) -> Result<()> {
    match operation {
        Operation::Put { map, key, value } => match maps.get(&map) {
            Some(core) => core.insert(key, value)?,
            None => warn!(map = %map, "WAL entry for undeclared map skipped"),
        },
        Operation::Delete { map, key } => match maps.get(&map) {
            Some(core) => {
                core.remove(&key)?;
            }
            None => warn!(map = %map, "WAL entry for undeclared map skipped"),
        },
    }
    Ok(())
}

fn unavailable(directory: &Path, error: Error) -> Error {
    Error::storage_unavailable(format!("{}: {}", directory.display(), error))
}
