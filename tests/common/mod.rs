//! Shared fixtures: throwaway storage, sample records, mock oracles.

#![allow(dead_code)] // Not every test binary uses every helper

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use glutton::core::config::{Config, ValidationPolicy};
use glutton::core::error::{Error, ErrorKind, Result};
use glutton::core::types::{BiblioRecord, IstexRecord, PmidRecord};
use glutton::oracle::client::{Extraction, OracleRequest, ValidationOracle};

pub fn test_config(dir: &Path) -> Config {
    Config {
        storage_path: dir.to_path_buf(),
        batch_size: 2,
        max_accepted_requests: 4,
        oracle_timeout_ms: 1_000,
        oracle_retry_backoff_ms: 10,
        validation_policy: ValidationPolicy::Always,
        ..Config::default()
    }
}

pub fn biblio(doi: &str, title: &str, first_author: &str, volume: &str, first_page: &str) -> BiblioRecord {
    BiblioRecord {
        doi: doi.to_string(),
        title: title.to_string(),
        first_author: first_author.to_string(),
        journal: "Journal of Tests".to_string(),
        issn: "1234-5678".to_string(),
        volume: volume.to_string(),
        first_page: first_page.to_string(),
        year: "1977".to_string(),
        ..BiblioRecord::default()
    }
}

pub fn istex(istex_id: &str, doi: &str, ark: &str) -> IstexRecord {
    IstexRecord {
        corpus_name: "bmj".to_string(),
        istex_id: istex_id.to_string(),
        doi: vec![doi.to_string()],
        ark: vec![ark.to_string()],
        ..IstexRecord::default()
    }
}

pub fn pmid(pmid: &str, pmcid: &str, doi: &str) -> PmidRecord {
    PmidRecord::new(pmid, pmcid, doi)
}

/// Answers from a fixed table; field requests are echoed back.
#[derive(Default)]
pub struct MockOracle {
    citations: HashMap<String, Extraction>,
    pub calls: AtomicUsize,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_citation(mut self, citation: &str, title: &str, first_author: &str) -> Self {
        self.citations.insert(
            citation.to_string(),
            Extraction {
                title: title.to_string(),
                first_author: first_author.to_string(),
            },
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValidationOracle for MockOracle {
    async fn extract(&self, request: &OracleRequest) -> Result<Extraction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match request {
            OracleRequest::Citation(text) => self.citations.get(text).cloned().unwrap_or_default(),
            OracleRequest::Fields { title, first_author } => Extraction {
                title: title.clone(),
                first_author: first_author.clone(),
            },
        })
    }
}

/// Echo oracle that sleeps before answering and tracks peak concurrency
pub struct SlowOracle {
    pub delay: Duration,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowOracle {
    pub fn new(delay: Duration) -> Self {
        SlowOracle {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ValidationOracle for SlowOracle {
    async fn extract(&self, request: &OracleRequest) -> Result<Extraction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(match request {
            OracleRequest::Citation(_) => Extraction::default(),
            OracleRequest::Fields { title, first_author } => Extraction {
                title: title.clone(),
                first_author: first_author.clone(),
            },
        })
    }
}

/// Fails the first `failures` calls, then echoes
pub struct FlakyOracle {
    failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyOracle {
    pub fn new(failures: usize) -> Self {
        FlakyOracle {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ValidationOracle for FlakyOracle {
    async fn extract(&self, request: &OracleRequest) -> Result<Extraction> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(Error::new(ErrorKind::UpstreamUnavailable, "connection refused".to_string()));
        }
        Ok(match request {
            OracleRequest::Citation(_) => Extraction::default(),
            OracleRequest::Fields { title, first_author } => Extraction {
                title: title.clone(),
                first_author: first_author.clone(),
            },
        })
    }
}

pub fn shared<T: ValidationOracle + 'static>(oracle: T) -> (Arc<T>, Arc<dyn ValidationOracle>) {
    let oracle = Arc::new(oracle);
    let dynamic: Arc<dyn ValidationOracle> = oracle.clone();
    (oracle, dynamic)
}
