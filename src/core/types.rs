use serde::{Serialize, Deserialize};

/// PubMed identifier triple, as produced by the PMID/PMCID/DOI dumps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmidRecord {
    pub pmid: String,
    pub pmcid: String,
    pub doi: String,
}

impl PmidRecord {
    pub fn new(pmid: &str, pmcid: &str, doi: &str) -> Self {
        PmidRecord {
            pmid: pmid.to_string(),
            pmcid: pmcid.to_string(),
            doi: doi.to_string(),
        }
    }
}

/// ISTEX identifiers for one document. Every list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IstexRecord {
    pub corpus_name: String,
    pub istex_id: String,
    pub doi: Vec<String>,
    pub ark: Vec<String>,
    pub pmid: Vec<String>,
    pub pmc: Vec<String>,
    pub mesh: Vec<String>,
    pub pii: Vec<String>,
}

impl IstexRecord {
    pub fn first_doi(&self) -> Option<&str> {
        first_non_blank(&self.doi)
    }

    pub fn first_ark(&self) -> Option<&str> {
        first_non_blank(&self.ark)
    }

    pub fn first_pmid(&self) -> Option<&str> {
        first_non_blank(&self.pmid)
    }

    pub fn first_pmc(&self) -> Option<&str> {
        first_non_blank(&self.pmc)
    }
}

fn first_non_blank(values: &[String]) -> Option<&str> {
    values.iter()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

/// Bibliographic metadata of a work, keyed by DOI in the crossref family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BiblioRecord {
    pub doi: String,
    pub title: String,
    /// Surname of the first author.
    pub first_author: String,
    pub journal: String,
    pub issn: String,
    pub volume: String,
    pub issue: String,
    pub first_page: String,
    pub year: String,
}
