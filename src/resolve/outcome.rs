use serde::Serialize;
use crate::core::types::BiblioRecord;

/// Which lookup produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    ExactDoi,
    PubMedId,
    PmcId,
    IstexId,
    Pii,
    Metadata,
    RawCitation,
}

/// Identifiers and links gathered for one work.
///
/// Each field is filled by the first source that has it: the ISTEX
/// record, then the PubMed relations, then the open-access index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRecord {
    pub doi: Option<String>,
    pub strategy: Option<Strategy>,
    pub metadata: Option<BiblioRecord>,
    pub istex_id: Option<String>,
    pub ark: Option<String>,
    pub pmid: Option<String>,
    pub pmcid: Option<String>,
    pub oa_link: Option<String>,
}

impl ResolvedRecord {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_none()
            && self.istex_id.is_none()
            && self.ark.is_none()
            && self.pmid.is_none()
            && self.pmcid.is_none()
            && self.oa_link.is_none()
    }
}

/// Result of one resolution request. Faults of the storage layer are
/// not outcomes; they come back as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Found(ResolvedRecord),
    NotFound,
    /// Post-validation refused the candidate found by a hashed lookup
    Ambiguous { rejected_doi: String },
    UpstreamUnavailable(String),
    ServiceOverloaded,
}

impl Outcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }

    pub fn record(&self) -> Option<&ResolvedRecord> {
        match self {
            Outcome::Found(record) => Some(record),
            _ => None,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Found(_) => "found",
            Outcome::NotFound => "not_found",
            Outcome::Ambiguous { .. } => "ambiguous",
            Outcome::UpstreamUnavailable(_) => "upstream_unavailable",
            Outcome::ServiceOverloaded => "service_overloaded",
        }
    }
}
