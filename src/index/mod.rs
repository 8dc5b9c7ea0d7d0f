pub mod pubmed;
pub mod istex;
pub mod oa;
pub mod metadata;
pub mod registry;

use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::core::error::Result;
use crate::storage::typed::{Index, IndexKey};

/// First `n` entries of a map in key order
pub(crate) fn take_entries<K, V>(index: &Index<K, V>, n: usize) -> Result<Vec<(K, V)>>
where
    K: IndexKey,
    V: Serialize + DeserializeOwned,
{
    index.iter()?.take(n).collect()
}
