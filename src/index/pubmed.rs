use std::collections::BTreeMap;
use crate::analysis::doi::{normalize_doi, normalize_key, normalize_pmcid};
use crate::core::error::Result;
use crate::core::types::PmidRecord;
use crate::index::take_entries;
use crate::storage::env::{IndexSpec, IndexStore};
use crate::storage::typed::Index;
use crate::writer::batch::BatchWriter;

pub const PMID_FAMILY: &str = "pmid";

const DOI_TO_PMID: &str = "pmid_doi2pmid";
const DOI_TO_PMCID: &str = "pmid_doi2pmcid";
const PMID_TO_DOI: &str = "pmid_pmid2doi";
const PMCID_TO_DOI: &str = "pmid_pmc2doi";

/// PubMed relations: DOI to PMID/PMCID and back.
#[derive(Clone)]
pub struct PubMedIndex {
    store: IndexStore,
    doi_to_pmid: Index<String, String>,
    doi_to_pmcid: Index<String, String>,
    pmid_to_doi: Index<String, String>,
    pmcid_to_doi: Index<String, String>,
    batch_size: usize,
}

impl PubMedIndex {
    pub fn specs() -> Vec<IndexSpec> {
        vec![
            IndexSpec::plain(DOI_TO_PMID),
            IndexSpec::plain(DOI_TO_PMCID),
            IndexSpec::plain(PMID_TO_DOI),
            IndexSpec::plain(PMCID_TO_DOI),
        ]
    }

    pub fn new(store: IndexStore, batch_size: usize) -> Result<Self> {
        Ok(PubMedIndex {
            doi_to_pmid: store.map(DOI_TO_PMID)?,
            doi_to_pmcid: store.map(DOI_TO_PMCID)?,
            pmid_to_doi: store.map(PMID_TO_DOI)?,
            pmcid_to_doi: store.map(PMCID_TO_DOI)?,
            store,
            batch_size,
        })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Write every relation the record carries. Records without a DOI
    /// have nothing to join on and are skipped.
    pub fn store_record(&self, record: &PmidRecord) -> Result<()> {
        let doi = normalize_doi(&record.doi);
        if doi.is_empty() {
            return Ok(());
        }

        let pmid = record.pmid.trim();
        if !pmid.is_empty() {
            self.doi_to_pmid.put(&doi, &pmid.to_string())?;
            self.pmid_to_doi.put(&normalize_key(pmid), &doi)?;
        }

        if !record.pmcid.trim().is_empty() {
            let pmcid = normalize_pmcid(&record.pmcid);
            self.doi_to_pmcid.put(&doi, &pmcid)?;
            self.pmcid_to_doi.put(&normalize_key(&pmcid), &doi)?;
        }
        Ok(())
    }

    pub fn load<I>(&self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = PmidRecord>,
    {
        let mut writer = BatchWriter::new(self.store.clone(), self.batch_size);
        for record in records {
            self.store_record(&record)?;
            writer.record_written()?;
        }
        writer.finish()
    }

    pub fn pmid_by_doi(&self, doi: &str) -> Result<Option<String>> {
        self.doi_to_pmid.get(&normalize_doi(doi))
    }

    pub fn pmcid_by_doi(&self, doi: &str) -> Result<Option<String>> {
        self.doi_to_pmcid.get(&normalize_doi(doi))
    }

    pub fn doi_by_pmid(&self, pmid: &str) -> Result<Option<String>> {
        self.pmid_to_doi.get(&normalize_key(pmid))
    }

    /// Accepts `PMC123` as well as a bare `123`
    pub fn doi_by_pmcid(&self, pmcid: &str) -> Result<Option<String>> {
        self.pmcid_to_doi.get(&normalize_key(&normalize_pmcid(pmcid)))
    }

    pub fn sizes(&self) -> Result<BTreeMap<String, u64>> {
        self.store.counts()
    }

    /// First `n` DOI to PMID pairs
    pub fn sample(&self, n: usize) -> Result<Vec<(String, String)>> {
        take_entries(&self.doi_to_pmid, n)
    }
}
