use std::fmt;
use std::fmt::Write;
use serde::{Serialize, Deserialize};
use sha2::{Digest, Sha256};
use crate::analysis::normalize::normalize_field;

/// Bytes kept from the SHA-256 digest.
pub const KEY_WIDTH: usize = 16;

// Domain tags keep metadata and citation keys apart even for equal text
const METADATA_DOMAIN: &[u8] = b"glutton/metadata/v1";
const CITATION_DOMAIN: &[u8] = b"glutton/citation/v1";
const TITLE_AUTHOR_DOMAIN: &[u8] = b"glutton/title-author/v1";

/// Fixed-width lookup key derived from normalized bibliographic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetadataKey(pub [u8; KEY_WIDTH]);

impl MetadataKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; KEY_WIDTH] = bytes.try_into().ok()?;
        Some(MetadataKey(raw))
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(KEY_WIDTH * 2);
        for byte in self.0 {
            let _ = write!(out, "{:02x}", byte);
        }
        out
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Stable digest over normalized fields.
///
/// Algorithm (fixed, keys on disk depend on it): SHA-256 over the domain
/// tag followed by, for each field in order, its normalized UTF-8 length
/// as little-endian `u64` and the normalized bytes. The first
/// `KEY_WIDTH` bytes of the digest form the key. Absent fields hash as
/// empty strings and still occupy their position.
pub struct KeyHasher;

impl KeyHasher {
    pub fn hash_metadata(title: &str, issn: &str, volume: &str, first_page: &str) -> MetadataKey {
        Self::digest(METADATA_DOMAIN, &[title, issn, volume, first_page])
    }

    /// Fallback key for references that carry no volume or page
    pub fn hash_title_author(title: &str, first_author: &str) -> MetadataKey {
        Self::digest(TITLE_AUTHOR_DOMAIN, &[title, first_author])
    }

    pub fn hash_citation(raw_citation: &str) -> MetadataKey {
        Self::digest(CITATION_DOMAIN, &[raw_citation])
    }

    fn digest(domain: &[u8], fields: &[&str]) -> MetadataKey {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        for field in fields {
            let normalized = normalize_field(field);
            hasher.update((normalized.len() as u64).to_le_bytes());
            hasher.update(normalized.as_bytes());
        }
        let digest = hasher.finalize();

        let mut key = [0u8; KEY_WIDTH];
        key.copy_from_slice(&digest[..KEY_WIDTH]);
        MetadataKey(key)
    }
}
