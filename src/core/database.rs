use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::info;
use crate::codec::record_codec::Codec;
use crate::core::config::{Config, ValidationPolicy};
use crate::core::error::Result;
use crate::core::stats::{Diagnostics, HealthStatus};
use crate::enrich::pass::{EnrichmentPass, EnrichmentReport};
use crate::enrich::sink::EnrichmentSink;
use crate::index::registry::CrossRefIndices;
use crate::oracle::client::ValidationOracle;
use crate::resolve::engine::{MetadataQuery, ResolutionEngine, ResolutionRequest};
use crate::resolve::outcome::Outcome;

/// Process-wide entry point: owns every dataset family and the
/// resolution engine. Opened once at startup, shared by reference, and
/// consumed by `close`.
pub struct Database {
    config: Arc<Config>,
    engine: ResolutionEngine,

    start_time: Instant,
    started_at: SystemTime,
}

impl Database {
    /// Without an oracle, hashed candidates that need validation come
    /// back as `UpstreamUnavailable`.
    pub fn open(config: Config) -> Result<Self> {
        Self::open_inner(config, None)
    }

    pub fn open_with_oracle(config: Config, oracle: Arc<dyn ValidationOracle>) -> Result<Self> {
        Self::open_inner(config, Some(oracle))
    }

    fn open_inner(config: Config, oracle: Option<Arc<dyn ValidationOracle>>) -> Result<Self> {
        let config = Arc::new(config);
        let codec = Arc::new(Codec::new(config.codec.clone()));
        let indices = CrossRefIndices::open(&config, codec)?;
        let engine = ResolutionEngine::new(indices, oracle, &config);

        info!(
            path = %config.storage_path.display(),
            gate_capacity = engine.gate().capacity(),
            policy = ?config.validation_policy,
            "database opened"
        );

        Ok(Database {
            config,
            engine,
            start_time: Instant::now(),
            started_at: SystemTime::now(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn indices(&self) -> &CrossRefIndices {
        self.engine.indices()
    }

    pub fn engine(&self) -> &ResolutionEngine {
        &self.engine
    }

    pub fn resolve_by_doi(&self, doi: &str) -> Result<Outcome> {
        self.engine.resolve_by_doi(doi)
    }

    pub fn resolve_by_pmid(&self, pmid: &str) -> Result<Outcome> {
        self.engine.resolve_by_pmid(pmid)
    }

    pub fn resolve_by_pmcid(&self, pmcid: &str) -> Result<Outcome> {
        self.engine.resolve_by_pmcid(pmcid)
    }

    pub fn resolve_by_istex_id(&self, istex_id: &str) -> Result<Outcome> {
        self.engine.resolve_by_istex_id(istex_id)
    }

    pub fn resolve_by_pii(&self, pii: &str) -> Result<Outcome> {
        self.engine.resolve_by_pii(pii)
    }

    pub fn oa_url_by_pii(&self, pii: &str) -> Result<Option<String>> {
        self.engine.oa_url_by_pii(pii)
    }

    pub async fn resolve_by_metadata(&self, query: &MetadataQuery, post_validate: bool) -> Result<Outcome> {
        self.engine.resolve_by_metadata(query, post_validate).await
    }

    pub async fn resolve_by_raw_citation(&self, text: &str, post_validate: bool) -> Result<Outcome> {
        self.engine.resolve_by_raw_citation(text, post_validate).await
    }

    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<Outcome> {
        self.engine.resolve(request).await
    }

    pub fn diagnostics(&self) -> Result<Diagnostics> {
        Ok(Diagnostics {
            uptime_secs: self.start_time.elapsed().as_secs(),
            start_time: self.started_at,
            indices: self.indices().diagnostics()?,
            gate: self.engine.gate().stats(),
            oracle_configured: self.engine.has_oracle(),
            cached_extractions: self.engine.cached_extractions(),
        })
    }

    pub fn health(&self) -> HealthStatus {
        if self.indices().is_closed() {
            return HealthStatus::Unhealthy("storage closed".to_string());
        }
        if self.engine.policy() == ValidationPolicy::Always && !self.engine.has_oracle() {
            return HealthStatus::Degraded("validation required but no oracle configured".to_string());
        }
        let gate = self.engine.gate();
        if gate.is_saturated() {
            return HealthStatus::Degraded(format!("all {} validation slots busy", gate.capacity()));
        }
        HealthStatus::Healthy
    }

    /// Fill missing PMID/PMCID of ISTEX records from the PubMed family
    pub fn enrich_istex<S: EnrichmentSink>(&self, sink: &mut S) -> Result<EnrichmentReport> {
        let indices = self.indices();
        EnrichmentPass::new(indices.istex.clone(), indices.pubmed.clone(), self.config.batch_size)
            .run(sink)
    }

    pub fn close(self) -> Result<()> {
        let result = self.indices().close();
        info!(uptime_secs = self.start_time.elapsed().as_secs(), "database closed");
        result
    }
}
