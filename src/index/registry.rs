use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use crate::codec::record_codec::Codec;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::index::istex::{IstexIndex, ISTEX_FAMILY};
use crate::index::metadata::{BiblioIndex, CROSSREF_FAMILY};
use crate::index::oa::{OpenAccessIndex, OA_FAMILY};
use crate::index::pubmed::{PubMedIndex, PMID_FAMILY};
use crate::storage::env::{IndexSpec, IndexStore, StoreOptions};
use crate::storage::wal::SyncMode;

/// Every dataset family, each in its own environment directory.
/// Opened once at startup and shared by all requests.
#[derive(Clone)]
pub struct CrossRefIndices {
    pub pubmed: PubMedIndex,
    pub istex: IstexIndex,
    pub oa: OpenAccessIndex,
    pub biblio: BiblioIndex,
}

impl CrossRefIndices {
    pub fn open(config: &Config, codec: Arc<Codec>) -> Result<Self> {
        let options = StoreOptions {
            sync_mode: SyncMode::Batch,
            wal_compaction_bytes: config.wal_compaction_bytes,
            ..StoreOptions::default()
        };
        let open = |family: &str, specs: Vec<IndexSpec>| {
            IndexStore::open(config.env_dir(family), &specs, Arc::clone(&codec), options.clone())
        };

        let pubmed = PubMedIndex::new(open(PMID_FAMILY, PubMedIndex::specs())?, config.batch_size)?;
        let istex = IstexIndex::new(open(ISTEX_FAMILY, IstexIndex::specs())?, config.batch_size)?;
        let oa = OpenAccessIndex::new(open(OA_FAMILY, OpenAccessIndex::specs())?, config.batch_size)?;
        let biblio = BiblioIndex::new(open(CROSSREF_FAMILY, BiblioIndex::specs())?, config.batch_size)?;

        info!(path = %config.storage_path.display(), "cross-reference indices ready");
        Ok(CrossRefIndices { pubmed, istex, oa, biblio })
    }

    fn stores(&self) -> [&IndexStore; 4] {
        [
            self.pubmed.store(),
            self.istex.store(),
            self.oa.store(),
            self.biblio.store(),
        ]
    }

    /// Entry count of every map, keyed by map name
    pub fn diagnostics(&self) -> Result<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for store in self.stores() {
            counts.extend(store.counts()?);
        }
        Ok(counts)
    }

    pub fn is_closed(&self) -> bool {
        self.stores().iter().any(|store| store.is_closed())
    }

    /// Close every family; the first failure is returned after all
    /// stores had their chance to close.
    pub fn close(&self) -> Result<()> {
        let mut first_error = None;
        for store in self.stores() {
            if let Err(e) = store.close() {
                warn!(path = %store.path().display(), error = %e, "closing store failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
