use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use crate::analysis::normalize::normalize_field;
use crate::core::error::Result;

/// What the oracle is asked to parse
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OracleRequest {
    Citation(String),
    Fields { title: String, first_author: String },
}

impl OracleRequest {
    /// Requests differing only in case or spacing share a cache slot
    pub fn cache_key(&self) -> OracleRequest {
        match self {
            OracleRequest::Citation(text) => OracleRequest::Citation(normalize_field(text)),
            OracleRequest::Fields { title, first_author } => OracleRequest::Fields {
                title: normalize_field(title),
                first_author: normalize_field(first_author),
            },
        }
    }
}

/// Title and first-author surname extracted by the oracle. Either may be
/// empty when the oracle could not parse it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub title: String,
    pub first_author: String,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.first_author.trim().is_empty()
    }
}

/// External metadata-extraction service used for post-validation.
///
/// Implementations report transport failures as errors; the engine
/// retries once and then answers `UpstreamUnavailable`. The answer itself
/// is untrusted: a wrong extraction only causes a rejection.
#[async_trait]
pub trait ValidationOracle: Send + Sync {
    async fn extract(&self, request: &OracleRequest) -> Result<Extraction>;
}
