use std::collections::BTreeMap;
use crate::analysis::doi::{normalize_doi, normalize_key};
use crate::core::error::Result;
use crate::core::types::IstexRecord;
use crate::index::take_entries;
use crate::storage::env::{IndexSpec, IndexStore};
use crate::storage::typed::{Index, IndexIter};
use crate::writer::batch::BatchWriter;

pub const ISTEX_FAMILY: &str = "istex";

const ISTEX_TO_IDS: &str = "istex_istex2ids";
const DOI_TO_IDS: &str = "istex_doi2ids";
const PII_TO_IDS: &str = "istex_pii2ids";

/// ISTEX records, reachable by ISTEX id, by any DOI and by any PII.
#[derive(Clone)]
pub struct IstexIndex {
    store: IndexStore,
    istex_to_record: Index<String, IstexRecord>,
    doi_to_record: Index<String, IstexRecord>,
    pii_to_record: Index<String, IstexRecord>,
    batch_size: usize,
}

impl IstexIndex {
    pub fn specs() -> Vec<IndexSpec> {
        vec![
            IndexSpec::plain(ISTEX_TO_IDS),
            IndexSpec::plain(DOI_TO_IDS),
            IndexSpec::plain(PII_TO_IDS),
        ]
    }

    pub fn new(store: IndexStore, batch_size: usize) -> Result<Self> {
        Ok(IstexIndex {
            istex_to_record: store.map(ISTEX_TO_IDS)?,
            doi_to_record: store.map(DOI_TO_IDS)?,
            pii_to_record: store.map(PII_TO_IDS)?,
            store,
            batch_size,
        })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Write the record under its id and fan it out under every DOI and
    /// PII it lists. Also used to write back enriched records.
    pub fn store_record(&self, record: &IstexRecord) -> Result<()> {
        let istex_id = normalize_key(&record.istex_id);
        if !istex_id.is_empty() {
            self.istex_to_record.put(&istex_id, record)?;
        }

        for doi in &record.doi {
            let doi = normalize_doi(doi);
            if !doi.is_empty() {
                self.doi_to_record.put(&doi, record)?;
            }
        }

        for pii in &record.pii {
            let pii = normalize_key(pii);
            if !pii.is_empty() {
                self.pii_to_record.put(&pii, record)?;
            }
        }
        Ok(())
    }

    pub fn load<I>(&self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = IstexRecord>,
    {
        let mut writer = BatchWriter::new(self.store.clone(), self.batch_size);
        for record in records {
            self.store_record(&record)?;
            writer.record_written()?;
        }
        writer.finish()
    }

    pub fn by_istex_id(&self, istex_id: &str) -> Result<Option<IstexRecord>> {
        self.istex_to_record.get(&normalize_key(istex_id))
    }

    pub fn by_doi(&self, doi: &str) -> Result<Option<IstexRecord>> {
        self.doi_to_record.get(&normalize_doi(doi))
    }

    pub fn by_pii(&self, pii: &str) -> Result<Option<IstexRecord>> {
        self.pii_to_record.get(&normalize_key(pii))
    }

    /// Every record once, in ISTEX id order
    pub fn iter_records(&self) -> Result<IndexIter<String, IstexRecord>> {
        self.istex_to_record.iter()
    }

    pub fn sizes(&self) -> Result<BTreeMap<String, u64>> {
        self.store.counts()
    }

    pub fn sample(&self, n: usize) -> Result<Vec<IstexRecord>> {
        Ok(take_entries(&self.istex_to_record, n)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }
}
