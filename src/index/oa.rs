use std::collections::BTreeMap;
use crate::analysis::doi::normalize_doi;
use crate::core::error::Result;
use crate::index::take_entries;
use crate::storage::env::{IndexSpec, IndexStore};
use crate::storage::typed::Index;
use crate::writer::batch::BatchWriter;

pub const OA_FAMILY: &str = "unpaywall";

const DOI_TO_OA_URL: &str = "unpaywall_doi2oaurl";

/// DOI to best open-access PDF location.
#[derive(Clone)]
pub struct OpenAccessIndex {
    store: IndexStore,
    doi_to_url: Index<String, String>,
    batch_size: usize,
}

impl OpenAccessIndex {
    pub fn specs() -> Vec<IndexSpec> {
        vec![IndexSpec::plain(DOI_TO_OA_URL)]
    }

    pub fn new(store: IndexStore, batch_size: usize) -> Result<Self> {
        Ok(OpenAccessIndex {
            doi_to_url: store.map(DOI_TO_OA_URL)?,
            store,
            batch_size,
        })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn store_url(&self, doi: &str, url: &str) -> Result<()> {
        let doi = normalize_doi(doi);
        let url = url.trim();
        if doi.is_empty() || url.is_empty() {
            return Ok(());
        }
        self.doi_to_url.put(&doi, &url.to_string())
    }

    /// Pairs of `(doi, url)`
    pub fn load<I>(&self, entries: I) -> Result<u64>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut writer = BatchWriter::new(self.store.clone(), self.batch_size);
        for (doi, url) in entries {
            self.store_url(&doi, &url)?;
            writer.record_written()?;
        }
        writer.finish()
    }

    pub fn url_by_doi(&self, doi: &str) -> Result<Option<String>> {
        self.doi_to_url.get(&normalize_doi(doi))
    }

    pub fn sizes(&self) -> Result<BTreeMap<String, u64>> {
        self.store.counts()
    }

    pub fn sample(&self, n: usize) -> Result<Vec<(String, String)>> {
        take_entries(&self.doi_to_url, n)
    }
}
