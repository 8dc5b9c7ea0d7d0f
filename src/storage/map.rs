use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use parking_lot::RwLock;
use crate::codec::record_codec::StoredForm;
use crate::core::error::Result;
use crate::storage::segment::SegmentMeta;
use crate::storage::segment_reader::SegmentReader;

/// Recent writes not yet flushed; `None` marks a deletion
pub type Memtable = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Immutable view of one map: the memtable over its segments.
///
/// A key resolves to the newest layer holding it: the memtable first,
/// then the segments newest first.
#[derive(Clone, Default)]
pub struct MapState {
    pub memtable: Memtable,
    /// Newest first
    pub segments: Vec<Arc<SegmentReader>>,
    pub live_count: u64,
}

impl MapState {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(slot) = self.memtable.get(key) {
            return Ok(slot.clone());
        }
        for segment in &self.segments {
            if let Some(entry) = segment.get(key)? {
                return Ok(entry.value.map(<[u8]>::to_vec));
            }
        }
        Ok(None)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        if let Some(slot) = self.memtable.get(key) {
            return Ok(slot.is_some());
        }
        for segment in &self.segments {
            if let Some(entry) = segment.get(key)? {
                return Ok(entry.value.is_some());
            }
        }
        Ok(false)
    }

    /// First live entry after `after` in key order
    pub fn next_after(&self, after: Option<&[u8]>) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let mut cursor = after.map(<[u8]>::to_vec);
        loop {
            let lower = match &cursor {
                Some(key) => Bound::Excluded(key.as_slice()),
                None => Bound::Unbounded,
            };
            // Smallest key over all layers; on a tie the newer layer wins
            let mut best: Option<(Vec<u8>, Option<Vec<u8>>)> = self
                .memtable
                .range::<[u8], _>((lower, Bound::Unbounded))
                .next()
                .map(|(key, slot)| (key.clone(), slot.clone()));
            for segment in &self.segments {
                if let Some(entry) = segment.seek_after(cursor.as_deref())? {
                    if best.as_ref().is_none_or(|(key, _)| entry.key < key.as_slice()) {
                        best = Some((entry.key.to_vec(), entry.value.map(<[u8]>::to_vec)));
                    }
                }
            }

            match best {
                None => return Ok(None),
                Some((key, Some(value))) => return Ok(Some((key, value))),
                Some((key, None)) => cursor = Some(key),
            }
        }
    }
}

/// One named key/value map of an environment.
///
/// The state sits behind a copy-on-write pointer: readers clone the
/// `Arc` and keep a consistent view, a writer copies the memtable only
/// while a snapshot is still held elsewhere. Segments are shared, never
/// copied.
pub struct MapCore {
    pub name: String,
    pub form: StoredForm,
    state: RwLock<Arc<MapState>>,
}

impl MapCore {
    pub fn new(name: &str, form: StoredForm) -> Self {
        MapCore {
            name: name.to_string(),
            form,
            state: RwLock::new(Arc::new(MapState::default())),
        }
    }

    /// Install the checkpointed segments. Nothing is read from them.
    pub fn open(name: &str, form: StoredForm, segments: Vec<Arc<SegmentReader>>, live_count: u64) -> Self {
        MapCore {
            name: name.to_string(),
            form,
            state: RwLock::new(Arc::new(MapState {
                memtable: Memtable::new(),
                segments,
                live_count,
            })),
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // Segment reads happen outside the lock
        self.snapshot().get(key)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.snapshot().contains(key)
    }

    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut guard = self.state.write();
        let existed = guard.contains(&key)?;
        let state = Arc::make_mut(&mut *guard);
        state.memtable.insert(key, Some(value));
        if !existed {
            state.live_count += 1;
        }
        Ok(())
    }

    pub fn remove(&self, key: &[u8]) -> Result<bool> {
        let mut guard = self.state.write();
        if !guard.contains(key)? {
            return Ok(false);
        }
        let state = Arc::make_mut(&mut *guard);
        if state.segments.is_empty() {
            state.memtable.remove(key);
        } else {
            state.memtable.insert(key.to_vec(), None);
        }
        state.live_count -= 1;
        Ok(true)
    }

    pub fn len(&self) -> u64 {
        self.state.read().live_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Arc<MapState> {
        Arc::clone(&*self.state.read())
    }

    pub fn is_dirty(&self) -> bool {
        !self.state.read().memtable.is_empty()
    }

    pub fn segment_metas(&self) -> Vec<SegmentMeta> {
        self.state.read().segments.iter().map(|segment| segment.meta).collect()
    }

    /// Swap the memtable for the segment it was flushed to
    pub fn install_flushed(&self, segment: Option<Arc<SegmentReader>>) {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);
        state.memtable.clear();
        if let Some(segment) = segment {
            state.segments.insert(0, segment);
        }
    }

    /// Replace the `run` newest segments with their merge
    pub fn install_merged(&self, run: usize, merged: Option<Arc<SegmentReader>>) {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);
        let run = run.min(state.segments.len());
        state.segments.drain(..run);
        if let Some(merged) = merged {
            state.segments.insert(0, merged);
        }
    }

    /// Drop the memtable and unmap the segments on close
    pub fn release(&self) {
        *self.state.write() = Arc::new(MapState::default());
    }
}

/// Ordered walk over a snapshot that does not borrow the map
pub struct RawIter {
    snapshot: Arc<MapState>,
    cursor: Option<Vec<u8>>,
    done: bool,
}

impl RawIter {
    pub fn new(snapshot: Arc<MapState>) -> Self {
        RawIter { snapshot, cursor: None, done: false }
    }
}

impl Iterator for RawIter {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.snapshot.next_after(self.cursor.as_deref()) {
            Ok(Some((key, value))) => {
                self.cursor = Some(key.clone());
                Some(Ok((key, value)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
