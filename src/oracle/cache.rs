use std::num::NonZeroUsize;
use lru::LruCache;
use parking_lot::Mutex;
use crate::oracle::client::{Extraction, OracleRequest};

/// Recent oracle answers, so a repeated request skips the gate
pub struct ExtractionCache {
    entries: Option<Mutex<LruCache<OracleRequest, Extraction>>>,
}

impl ExtractionCache {
    /// A capacity of 0 disables caching
    pub fn new(capacity: usize) -> Self {
        ExtractionCache {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn get(&self, request: &OracleRequest) -> Option<Extraction> {
        let entries = self.entries.as_ref()?;
        entries.lock().get(&request.cache_key()).cloned()
    }

    pub fn insert(&self, request: &OracleRequest, extraction: Extraction) {
        if let Some(entries) = &self.entries {
            entries.lock().put(request.cache_key(), extraction);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
