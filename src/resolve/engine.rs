use std::sync::Arc;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};
use crate::analysis::doi::{extract_doi, normalize_doi, normalize_pmcid};
use crate::core::config::{Config, ValidationPolicy};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::IstexRecord;
use crate::index::registry::CrossRefIndices;
use crate::oracle::cache::ExtractionCache;
use crate::oracle::client::{Extraction, OracleRequest, ValidationOracle};
use crate::oracle::gate::ConcurrencyGate;
use crate::resolve::outcome::{Outcome, ResolvedRecord, Strategy};
use crate::resolve::validation::metadata_matches;

/// Structured bibliographic fields for a hashed lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataQuery {
    pub title: String,
    pub first_author: String,
    pub issn: String,
    pub volume: String,
    pub first_page: String,
}

impl MetadataQuery {
    pub fn new(title: &str, volume: &str, first_page: &str) -> Self {
        MetadataQuery {
            title: title.to_string(),
            volume: volume.to_string(),
            first_page: first_page.to_string(),
            ..MetadataQuery::default()
        }
    }

    pub fn with_first_author(mut self, first_author: &str) -> Self {
        self.first_author = first_author.to_string();
        self
    }

    pub fn with_issn(mut self, issn: &str) -> Self {
        self.issn = issn.to_string();
        self
    }
}

/// Whatever the caller knows about a work. Blank fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolutionRequest {
    pub doi: String,
    pub pmid: String,
    pub pmcid: String,
    pub istex_id: String,
    pub pii: String,
    pub metadata: MetadataQuery,
    pub raw_citation: String,
    pub post_validate: bool,
}

impl ResolutionRequest {
    fn is_blank(&self) -> bool {
        [
            &self.doi,
            &self.pmid,
            &self.pmcid,
            &self.istex_id,
            &self.pii,
            &self.metadata.title,
            &self.raw_citation,
        ]
        .iter()
        .all(|field| field.trim().is_empty())
    }
}

enum Verdict {
    Accepted,
    Rejected,
    Unavailable(String),
    Overloaded,
}

/// Resolves identifiers and metadata against the cross-reference
/// indices.
///
/// Precedence: exact identifiers (DOI, PMID, PMCID, ISTEX id, PII),
/// then the metadata hash, then the raw citation (embedded DOI first,
/// then citation hash). Hashed candidates are checked by the validation
/// oracle when the caller asks for it or when the configured policy is
/// `Always`.
pub struct ResolutionEngine {
    indices: CrossRefIndices,
    oracle: Option<Arc<dyn ValidationOracle>>,
    gate: Arc<ConcurrencyGate>,
    cache: ExtractionCache,
    policy: ValidationPolicy,
    oracle_timeout: Duration,
    retry_backoff: Duration,
}

impl ResolutionEngine {
    pub fn new(
        indices: CrossRefIndices,
        oracle: Option<Arc<dyn ValidationOracle>>,
        config: &Config,
    ) -> Self {
        ResolutionEngine {
            indices,
            oracle,
            gate: Arc::new(ConcurrencyGate::new(config.gate_capacity())),
            cache: ExtractionCache::new(config.oracle_cache_size),
            policy: config.validation_policy,
            oracle_timeout: config.oracle_timeout(),
            retry_backoff: config.oracle_retry_backoff(),
        }
    }

    pub fn indices(&self) -> &CrossRefIndices {
        &self.indices
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn cached_extractions(&self) -> usize {
        self.cache.len()
    }

    pub fn resolve_by_doi(&self, doi: &str) -> Result<Outcome> {
        let doi = normalize_doi(doi);
        if doi.is_empty() {
            return Err(Error::invalid_argument("blank DOI"));
        }
        Ok(found_or_not(self.assemble(Some(&doi), Strategy::ExactDoi, None)?))
    }

    pub fn resolve_by_pmid(&self, pmid: &str) -> Result<Outcome> {
        let pmid = pmid.trim();
        if pmid.is_empty() {
            return Err(Error::invalid_argument("blank PMID"));
        }
        let Some(doi) = self.indices.pubmed.doi_by_pmid(pmid)? else {
            return Ok(Outcome::NotFound);
        };

        let mut record = self.assemble(Some(&doi), Strategy::PubMedId, None)?;
        record.pmid.get_or_insert_with(|| pmid.to_string());
        Ok(Outcome::Found(record))
    }

    /// `PMC123` or a bare `123`
    pub fn resolve_by_pmcid(&self, pmcid: &str) -> Result<Outcome> {
        if pmcid.trim().is_empty() {
            return Err(Error::invalid_argument("blank PMCID"));
        }
        let pmcid = normalize_pmcid(pmcid);
        let Some(doi) = self.indices.pubmed.doi_by_pmcid(&pmcid)? else {
            return Ok(Outcome::NotFound);
        };

        let mut record = self.assemble(Some(&doi), Strategy::PmcId, None)?;
        record.pmcid.get_or_insert(pmcid);
        Ok(Outcome::Found(record))
    }

    pub fn resolve_by_istex_id(&self, istex_id: &str) -> Result<Outcome> {
        if istex_id.trim().is_empty() {
            return Err(Error::invalid_argument("blank ISTEX id"));
        }
        let Some(istex) = self.indices.istex.by_istex_id(istex_id)? else {
            return Ok(Outcome::NotFound);
        };

        let doi = istex.first_doi().map(normalize_doi);
        let record = self.assemble(doi.as_deref(), Strategy::IstexId, Some(istex))?;
        Ok(Outcome::Found(record))
    }

    /// Publisher item identifier, through the ISTEX records
    pub fn resolve_by_pii(&self, pii: &str) -> Result<Outcome> {
        if pii.trim().is_empty() {
            return Err(Error::invalid_argument("blank PII"));
        }
        let Some(istex) = self.indices.istex.by_pii(pii)? else {
            return Ok(Outcome::NotFound);
        };

        let doi = istex.first_doi().map(normalize_doi);
        let record = self.assemble(doi.as_deref(), Strategy::Pii, Some(istex))?;
        Ok(Outcome::Found(record))
    }

    /// Best open-access link of the work a PII names
    pub fn oa_url_by_pii(&self, pii: &str) -> Result<Option<String>> {
        if pii.trim().is_empty() {
            return Err(Error::invalid_argument("blank PII"));
        }
        let Some(istex) = self.indices.istex.by_pii(pii)? else {
            return Ok(None);
        };
        match istex.first_doi() {
            Some(doi) => self.indices.oa.url_by_doi(doi),
            None => Ok(None),
        }
    }

    pub async fn resolve_by_metadata(&self, query: &MetadataQuery, post_validate: bool) -> Result<Outcome> {
        if query.title.trim().is_empty() {
            return Err(Error::invalid_argument("metadata lookup needs a title"));
        }

        let biblio = &self.indices.biblio;
        let mut candidate = biblio.doi_by_metadata(&query.title, &query.issn, &query.volume, &query.first_page)?;
        if candidate.is_none() && !query.issn.trim().is_empty() {
            candidate = biblio.doi_by_metadata(&query.title, "", &query.volume, &query.first_page)?;
        }
        if candidate.is_none() && !query.first_author.trim().is_empty() {
            candidate = biblio.doi_by_title_author(&query.title, &query.first_author)?;
        }
        let Some(doi) = candidate else {
            return Ok(Outcome::NotFound);
        };

        let request = OracleRequest::Fields {
            title: query.title.clone(),
            first_author: query.first_author.clone(),
        };
        self.confirmed(&doi, Strategy::Metadata, &request, post_validate).await
    }

    pub async fn resolve_by_raw_citation(&self, text: &str, post_validate: bool) -> Result<Outcome> {
        if text.trim().is_empty() {
            return Err(Error::invalid_argument("blank citation"));
        }

        if let Some(doi) = extract_doi(text) {
            let outcome = self.resolve_by_doi(&doi)?;
            if outcome.is_found() {
                return Ok(outcome);
            }
            debug!(doi = %doi, "DOI found in citation is not indexed");
        }

        let Some(doi) = self.indices.biblio.doi_by_citation(text)? else {
            return Ok(Outcome::NotFound);
        };
        let request = OracleRequest::Citation(text.to_string());
        self.confirmed(&doi, Strategy::RawCitation, &request, post_validate).await
    }

    /// Run every strategy the request has input for, in precedence
    /// order. A rejected hashed candidate does not stop the chain; it
    /// only turns a final miss into `Ambiguous`.
    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<Outcome> {
        if request.is_blank() {
            return Err(Error::invalid_argument("nothing to resolve"));
        }

        let exact: [(&str, fn(&Self, &str) -> Result<Outcome>); 5] = [
            (request.doi.as_str(), Self::resolve_by_doi),
            (request.pmid.as_str(), Self::resolve_by_pmid),
            (request.pmcid.as_str(), Self::resolve_by_pmcid),
            (request.istex_id.as_str(), Self::resolve_by_istex_id),
            (request.pii.as_str(), Self::resolve_by_pii),
        ];
        for (value, strategy) in exact {
            if value.trim().is_empty() {
                continue;
            }
            let outcome = strategy(self, value)?;
            if outcome.is_found() {
                return Ok(outcome);
            }
        }

        let mut rejected = None;

        if !request.metadata.title.trim().is_empty() {
            match self.resolve_by_metadata(&request.metadata, request.post_validate).await? {
                Outcome::NotFound => {}
                Outcome::Ambiguous { rejected_doi } => rejected = Some(rejected_doi),
                outcome => return Ok(outcome),
            }
        }

        if !request.raw_citation.trim().is_empty() {
            match self.resolve_by_raw_citation(&request.raw_citation, request.post_validate).await? {
                Outcome::NotFound => {}
                Outcome::Ambiguous { rejected_doi } => {
                    rejected.get_or_insert(rejected_doi);
                }
                outcome => return Ok(outcome),
            }
        }

        Ok(match rejected {
            Some(rejected_doi) => Outcome::Ambiguous { rejected_doi },
            None => Outcome::NotFound,
        })
    }

    async fn confirmed(
        &self,
        doi: &str,
        strategy: Strategy,
        request: &OracleRequest,
        post_validate: bool,
    ) -> Result<Outcome> {
        match self.confirm(doi, request, post_validate).await? {
            Verdict::Accepted => Ok(Outcome::Found(self.assemble(Some(doi), strategy, None)?)),
            Verdict::Rejected => {
                debug!(doi = %doi, strategy = ?strategy, "candidate rejected by post-validation");
                Ok(Outcome::Ambiguous { rejected_doi: doi.to_string() })
            }
            Verdict::Unavailable(reason) => Ok(Outcome::UpstreamUnavailable(reason)),
            Verdict::Overloaded => Ok(Outcome::ServiceOverloaded),
        }
    }

    async fn confirm(&self, doi: &str, request: &OracleRequest, post_validate: bool) -> Result<Verdict> {
        if !post_validate && self.policy == ValidationPolicy::OnRequest {
            return Ok(Verdict::Accepted);
        }

        let Some(candidate) = self.indices.biblio.biblio_by_doi(doi)? else {
            debug!(doi = %doi, "no stored metadata to validate against");
            return Ok(Verdict::Rejected);
        };

        match self.extract(request).await {
            Ok(extraction) if metadata_matches(&extraction, &candidate) => Ok(Verdict::Accepted),
            Ok(_) => Ok(Verdict::Rejected),
            Err(e) if e.is(ErrorKind::ServiceOverloaded) => Ok(Verdict::Overloaded),
            Err(e) if e.is(ErrorKind::UpstreamUnavailable) => Ok(Verdict::Unavailable(e.context)),
            Err(e) => Err(e),
        }
    }

    /// Cached answer, or one oracle call under a gate slot. A failed call
    /// is retried once after the backoff, still holding the slot.
    async fn extract(&self, request: &OracleRequest) -> Result<Extraction> {
        if let Some(extraction) = self.cache.get(request) {
            return Ok(extraction);
        }
        let Some(oracle) = &self.oracle else {
            return Err(Error::new(
                ErrorKind::UpstreamUnavailable,
                "no validation oracle configured".to_string(),
            ));
        };

        let _permit = self.gate.try_admit()?;

        let extraction = match self.call_oracle(oracle.as_ref(), request).await {
            Ok(extraction) => extraction,
            Err(first) => {
                warn!(error = %first, "oracle call failed, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                self.call_oracle(oracle.as_ref(), request).await.map_err(|second| {
                    warn!(error = %second, "oracle call failed after retry");
                    Error::new(ErrorKind::UpstreamUnavailable, second.context)
                })?
            }
        };

        self.cache.insert(request, extraction.clone());
        Ok(extraction)
    }

    async fn call_oracle(&self, oracle: &dyn ValidationOracle, request: &OracleRequest) -> Result<Extraction> {
        match tokio::time::timeout(self.oracle_timeout, oracle.extract(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::new(
                ErrorKind::UpstreamUnavailable,
                format!("oracle timed out after {:?}", self.oracle_timeout),
            )),
        }
    }

    /// Gather everything known about a DOI. ISTEX values win; PubMed
    /// relations only fill what the ISTEX record leaves empty.
    fn assemble(&self, doi: Option<&str>, strategy: Strategy, istex: Option<IstexRecord>) -> Result<ResolvedRecord> {
        let istex = match (istex, doi) {
            (Some(record), _) => Some(record),
            (None, Some(doi)) => self.indices.istex.by_doi(doi)?,
            (None, None) => None,
        };

        let mut record = ResolvedRecord {
            doi: doi.map(str::to_string),
            strategy: Some(strategy),
            ..ResolvedRecord::default()
        };

        if let Some(istex) = &istex {
            record.istex_id = Some(istex.istex_id.clone()).filter(|id| !id.trim().is_empty());
            record.ark = istex.first_ark().map(str::to_string);
            record.pmid = istex.first_pmid().map(str::to_string);
            record.pmcid = istex.first_pmc().map(str::to_string);
        }

        if let Some(doi) = doi {
            if record.pmid.is_none() {
                record.pmid = self.indices.pubmed.pmid_by_doi(doi)?;
            }
            if record.pmcid.is_none() {
                record.pmcid = self.indices.pubmed.pmcid_by_doi(doi)?;
            }
            record.metadata = self.indices.biblio.biblio_by_doi(doi)?;
            record.oa_link = self.indices.oa.url_by_doi(doi)?;
        }

        Ok(record)
    }
}

fn found_or_not(record: ResolvedRecord) -> Outcome {
    if record.is_empty() {
        Outcome::NotFound
    } else {
        Outcome::Found(record)
    }
}
