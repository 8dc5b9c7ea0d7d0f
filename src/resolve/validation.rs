use crate::analysis::normalize::fields_match;
use crate::core::types::BiblioRecord;
use crate::oracle::client::Extraction;

/// Accept a hashed candidate only when the oracle's title and first
/// author both agree with the stored record. A blank field on either
/// side is a disagreement.
pub fn metadata_matches(extraction: &Extraction, candidate: &BiblioRecord) -> bool {
    fields_match(&extraction.title, &candidate.title)
        && fields_match(&extraction.first_author, &candidate.first_author)
}

