use std::marker::PhantomData;
use std::sync::Arc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::core::error::{Error, Result};
use crate::hashing::key_hasher::MetadataKey;
use crate::storage::env::IndexStore;
use crate::storage::map::{MapCore, RawIter};

/// Key types a map can be addressed by
pub trait IndexKey: Sized {
    fn to_key_bytes(&self) -> Vec<u8>;
    fn from_key_bytes(bytes: &[u8]) -> Result<Self>;
}

impl IndexKey for String {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::corrupt(format!("key is not UTF-8: {}", e)))
    }
}

impl IndexKey for MetadataKey {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        MetadataKey::from_slice(bytes)
            .ok_or_else(|| Error::corrupt(format!("metadata key of {} bytes", bytes.len())))
    }
}

/// Typed view of one map. Values go through the store's codec in the
/// map's declared stored form.
pub struct Index<K, V> {
    store: IndexStore,
    core: Arc<MapCore>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for Index<K, V> {
    fn clone(&self) -> Self {
        Index {
            store: self.store.clone(),
            core: Arc::clone(&self.core),
            _marker: PhantomData,
        }
    }
}

impl<K, V> Index<K, V>
where
    K: IndexKey,
    V: Serialize + DeserializeOwned,
{
    pub(crate) fn new(store: IndexStore, core: Arc<MapCore>) -> Self {
        Index {
            store,
            core,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let key_bytes = key.to_key_bytes();
        match self.store.get_raw(&self.core, &key_bytes)? {
            None => Ok(None),
            Some(bytes) => self.decode_value(&key_bytes, &bytes).map(Some),
        }
    }

    pub fn put(&self, key: &K, value: &V) -> Result<()> {
        let bytes = self.store.codec().encode_as(value, self.core.form)?;
        self.store.put_raw(&self.core, key.to_key_bytes(), bytes)
    }

    /// Returns whether the key was present
    pub fn delete(&self, key: &K) -> Result<bool> {
        self.store.delete_raw(&self.core, key.to_key_bytes())
    }

    /// O(1), values are not decoded
    pub fn count(&self) -> Result<u64> {
        self.store.ensure_open()?;
        Ok(self.core.len())
    }

    /// Ordered walk over the map as of this call. Writes made while the
    /// iterator is alive are not observed by it.
    pub fn iter(&self) -> Result<IndexIter<K, V>> {
        self.store.ensure_open()?;
        Ok(IndexIter {
            index: self.clone(),
            raw: RawIter::new(self.core.snapshot()),
            done: false,
        })
    }

    fn decode_value(&self, key: &[u8], bytes: &[u8]) -> Result<V> {
        self.store
            .codec()
            .decode_as(bytes, self.core.form)
            .map_err(|e| Error::new(
                e.kind,
                format!("{}[{}]: {}", self.core.name, String::from_utf8_lossy(key), e.context),
            ))
    }
}

/// Lazy sequence of decoded entries. A value that fails to decode
/// yields an error and iteration continues; a closed store or an
/// unreadable segment ends it after one error.
pub struct IndexIter<K, V> {
    index: Index<K, V>,
    raw: RawIter,
    done: bool,
}

impl<K, V> Iterator for IndexIter<K, V>
where
    K: IndexKey,
    V: Serialize + DeserializeOwned,
{
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Err(e) = self.index.store.ensure_open() {
            self.done = true;
            return Some(Err(e));
        }

        let (key_bytes, value_bytes) = match self.raw.next()? {
            Ok(entry) => entry,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let entry = K::from_key_bytes(&key_bytes)
            .and_then(|key| Ok((key, self.index.decode_value(&key_bytes, &value_bytes)?)));
        Some(entry)
    }
}
