use std::collections::BTreeMap;
use crate::analysis::doi::normalize_doi;
use crate::core::error::Result;
use crate::core::types::BiblioRecord;
use crate::hashing::key_hasher::{KeyHasher, MetadataKey};
use crate::index::take_entries;
use crate::storage::env::{IndexSpec, IndexStore};
use crate::storage::typed::Index;
use crate::writer::batch::BatchWriter;

pub const CROSSREF_FAMILY: &str = "crossref";

const DOI_TO_BIBLIO: &str = "crossref_doi2biblio";
const METADATA_TO_DOI: &str = "crossref_metahash2doi";
const CITATION_TO_DOI: &str = "crossref_citehash2doi";

/// Bibliographic records by DOI, plus the two hashed lookups that lead
/// back to a DOI when none is known.
///
/// Stored forms: `crossref_doi2biblio` is compressed, the hash maps are
/// plain.
#[derive(Clone)]
pub struct BiblioIndex {
    store: IndexStore,
    doi_to_biblio: Index<String, BiblioRecord>,
    metadata_to_doi: Index<MetadataKey, String>,
    citation_to_doi: Index<MetadataKey, String>,
    batch_size: usize,
}

impl BiblioIndex {
    pub fn specs() -> Vec<IndexSpec> {
        vec![
            IndexSpec::compressed(DOI_TO_BIBLIO),
            IndexSpec::plain(METADATA_TO_DOI),
            IndexSpec::plain(CITATION_TO_DOI),
        ]
    }

    pub fn new(store: IndexStore, batch_size: usize) -> Result<Self> {
        Ok(BiblioIndex {
            doi_to_biblio: store.map(DOI_TO_BIBLIO)?,
            metadata_to_doi: store.map(METADATA_TO_DOI)?,
            citation_to_doi: store.map(CITATION_TO_DOI)?,
            store,
            batch_size,
        })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Store the record and its metadata keys. The full key is
    /// registered both with and without ISSN so queries that lack one
    /// still resolve; a title and first author key covers queries with
    /// neither volume nor page.
    pub fn store_record(&self, record: &BiblioRecord) -> Result<()> {
        let doi = normalize_doi(&record.doi);
        if doi.is_empty() {
            return Ok(());
        }
        self.doi_to_biblio.put(&doi, record)?;

        if record.title.trim().is_empty() {
            return Ok(());
        }
        let with_issn = KeyHasher::hash_metadata(&record.title, &record.issn, &record.volume, &record.first_page);
        self.register_key(&with_issn, &doi)?;
        if !record.issn.trim().is_empty() {
            let without_issn = KeyHasher::hash_metadata(&record.title, "", &record.volume, &record.first_page);
            self.register_key(&without_issn, &doi)?;
        }
        if !record.first_author.trim().is_empty() {
            let title_author = KeyHasher::hash_title_author(&record.title, &record.first_author);
            self.register_key(&title_author, &doi)?;
        }
        Ok(())
    }

    /// Map a metadata key to a DOI directly
    pub fn register_key(&self, key: &MetadataKey, doi: &str) -> Result<()> {
        self.metadata_to_doi.put(key, &normalize_doi(doi))
    }

    pub fn store_citation(&self, raw_citation: &str, doi: &str) -> Result<()> {
        if raw_citation.trim().is_empty() {
            return Ok(());
        }
        let key = KeyHasher::hash_citation(raw_citation);
        self.citation_to_doi.put(&key, &normalize_doi(doi))
    }

    pub fn load<I>(&self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = BiblioRecord>,
    {
        let mut writer = BatchWriter::new(self.store.clone(), self.batch_size);
        for record in records {
            self.store_record(&record)?;
            writer.record_written()?;
        }
        writer.finish()
    }

    pub fn biblio_by_doi(&self, doi: &str) -> Result<Option<BiblioRecord>> {
        self.doi_to_biblio.get(&normalize_doi(doi))
    }

    pub fn doi_by_metadata(&self, title: &str, issn: &str, volume: &str, first_page: &str) -> Result<Option<String>> {
        self.doi_by_key(&KeyHasher::hash_metadata(title, issn, volume, first_page))
    }

    pub fn doi_by_title_author(&self, title: &str, first_author: &str) -> Result<Option<String>> {
        self.doi_by_key(&KeyHasher::hash_title_author(title, first_author))
    }

    pub fn doi_by_key(&self, key: &MetadataKey) -> Result<Option<String>> {
        self.metadata_to_doi.get(key)
    }

    pub fn doi_by_citation(&self, raw_citation: &str) -> Result<Option<String>> {
        self.citation_to_doi.get(&KeyHasher::hash_citation(raw_citation))
    }

    pub fn sizes(&self) -> Result<BTreeMap<String, u64>> {
        self.store.counts()
    }

    pub fn sample(&self, n: usize) -> Result<Vec<BiblioRecord>> {
        Ok(take_entries(&self.doi_to_biblio, n)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }
}
