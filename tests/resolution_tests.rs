//! Resolution engine through the database facade.

mod common;

use common::{biblio, istex, pmid, shared, test_config, FlakyOracle, MockOracle};
use glutton::core::config::ValidationPolicy;
use glutton::core::database::Database;
use glutton::core::error::ErrorKind;
use glutton::core::stats::HealthStatus;
use glutton::hashing::key_hasher::KeyHasher;
use glutton::resolve::engine::{MetadataQuery, ResolutionRequest};
use glutton::resolve::outcome::{Outcome, Strategy};
use tempfile::TempDir;

const STI_DOI: &str = "10.1136/sti.53.1.56";
const STI_PII: &str = "S0007-1242(77)90040-2";
const ALPHA_CITATION: &str = "Smith J. Alpha study. Journal of Tests 1977;1:10-12.";

fn seed(db: &Database) {
    let indices = db.indices();
    indices
        .pubmed
        .load(vec![
            pmid("557360", "PMC1045357", STI_DOI),
            pmid("111", "", "10.1000/exact"),
        ])
        .unwrap();

    let mut sti = istex("052DBC6D84C9F6A40D3CE1ED2E9E5E1B2D5E4F13", STI_DOI, "ark:/67375/NVC-8SNSRJ6Z-Z");
    sti.pmid = vec!["999".to_string()];
    sti.pii = vec![STI_PII.to_string()];
    indices.istex.load(vec![sti]).unwrap();

    indices
        .oa
        .load(vec![(STI_DOI.to_string(), "https://example.org/sti.pdf".to_string())])
        .unwrap();

    indices
        .biblio
        .load(vec![
            biblio("10.1000/a", "Alpha study", "Smith", "1", "10"),
            biblio("10.1000/b", "Beta trial", "Jones", "2", "20"),
            biblio("10.1000/other", "Unrelated paper", "Doe", "3", "30"),
        ])
        .unwrap();
    indices.biblio.store_citation(ALPHA_CITATION, "10.1000/a").unwrap();
}

fn open_with_mock(dir: &TempDir, oracle: MockOracle) -> Database {
    let (_, oracle) = shared(oracle);
    let db = Database::open_with_oracle(test_config(dir.path()), oracle).unwrap();
    seed(&db);
    db
}

#[test]
fn exact_doi_collects_every_identifier() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());

    let outcome = db.resolve_by_doi(STI_DOI).unwrap();
    let record = outcome.record().unwrap();
    assert_eq!(record.doi.as_deref(), Some(STI_DOI));
    assert_eq!(record.strategy, Some(Strategy::ExactDoi));
    assert_eq!(record.istex_id.as_deref(), Some("052DBC6D84C9F6A40D3CE1ED2E9E5E1B2D5E4F13"));
    assert_eq!(record.ark.as_deref(), Some("ark:/67375/NVC-8SNSRJ6Z-Z"));
    assert_eq!(record.oa_link.as_deref(), Some("https://example.org/sti.pdf"));
    // The ISTEX record's own PMID wins, PubMed fills the missing PMCID
    assert_eq!(record.pmid.as_deref(), Some("999"));
    assert_eq!(record.pmcid.as_deref(), Some("PMC1045357"));
}

#[test]
fn doi_lookup_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());

    let lower = db.resolve_by_doi("10.1136/sti.53.1.56").unwrap();
    let upper = db.resolve_by_doi("10.1136/STI.53.1.56").unwrap();
    let prefixed = db.resolve_by_doi("https://doi.org/10.1136/Sti.53.1.56").unwrap();
    assert!(lower.is_found());
    assert_eq!(lower, upper);
    assert_eq!(lower, prefixed);
}

#[test]
fn unknown_doi_is_not_found() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());
    assert_eq!(db.resolve_by_doi("10.9999/missing").unwrap(), Outcome::NotFound);
}

#[test]
fn blank_input_is_invalid() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());
    assert_eq!(db.resolve_by_doi("  ").unwrap_err().kind, ErrorKind::InvalidArgument);
    assert_eq!(db.resolve_by_pmid("").unwrap_err().kind, ErrorKind::InvalidArgument);
}

#[test]
fn pubmed_and_istex_identifiers_resolve() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());

    let by_pmid = db.resolve_by_pmid("111").unwrap();
    let record = by_pmid.record().unwrap();
    assert_eq!(record.doi.as_deref(), Some("10.1000/exact"));
    assert_eq!(record.pmid.as_deref(), Some("111"));
    assert_eq!(record.strategy, Some(Strategy::PubMedId));

    let bare = db.resolve_by_pmcid("1045357").unwrap();
    let prefixed = db.resolve_by_pmcid("PMC1045357").unwrap();
    assert_eq!(bare, prefixed);
    assert_eq!(bare.record().unwrap().doi.as_deref(), Some(STI_DOI));

    let by_istex = db.resolve_by_istex_id("052dbc6d84c9f6a40d3ce1ed2e9e5e1b2d5e4f13").unwrap();
    assert_eq!(by_istex.record().unwrap().doi.as_deref(), Some(STI_DOI));

    assert_eq!(db.resolve_by_pmid("424242").unwrap(), Outcome::NotFound);
}

#[tokio::test]
async fn pii_resolves_through_istex_records() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());

    let outcome = db.resolve_by_pii(STI_PII).unwrap();
    let record = outcome.record().unwrap();
    assert_eq!(record.doi.as_deref(), Some(STI_DOI));
    assert_eq!(record.strategy, Some(Strategy::Pii));
    assert_eq!(record.istex_id.as_deref(), Some("052DBC6D84C9F6A40D3CE1ED2E9E5E1B2D5E4F13"));
    assert_eq!(record.pmcid.as_deref(), Some("PMC1045357"));
    assert_eq!(record.oa_link.as_deref(), Some("https://example.org/sti.pdf"));

    assert!(db.resolve_by_pii(&format!(" {} ", STI_PII.to_lowercase())).unwrap().is_found());
    assert_eq!(db.resolve_by_pii("S0000-0000(00)00000-0").unwrap(), Outcome::NotFound);
    assert_eq!(db.resolve_by_pii("  ").unwrap_err().kind, ErrorKind::InvalidArgument);

    assert_eq!(db.oa_url_by_pii(STI_PII).unwrap().as_deref(), Some("https://example.org/sti.pdf"));
    assert_eq!(db.oa_url_by_pii("S0000-0000(00)00000-0").unwrap(), None);

    // An unknown PMID does not hide a known PII
    let request = ResolutionRequest {
        pmid: "424242".to_string(),
        pii: STI_PII.to_string(),
        ..ResolutionRequest::default()
    };
    let outcome = db.resolve(&request).await.unwrap();
    assert_eq!(outcome.record().unwrap().strategy, Some(Strategy::Pii));
}

#[tokio::test]
async fn exact_doi_takes_precedence_over_metadata_hash() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());
    // The request's metadata hashes to a different DOI
    let key = KeyHasher::hash_metadata("Exact title", "", "9", "90");
    db.indices().biblio.register_key(&key, "10.1000/other").unwrap();

    let request = ResolutionRequest {
        doi: "10.1000/EXACT".to_string(),
        metadata: MetadataQuery::new("Exact title", "9", "90"),
        ..ResolutionRequest::default()
    };
    let outcome = db.resolve(&request).await.unwrap();
    let record = outcome.record().unwrap();
    assert_eq!(record.doi.as_deref(), Some("10.1000/exact"));
    assert_eq!(record.strategy, Some(Strategy::ExactDoi));
    assert_eq!(record.pmid.as_deref(), Some("111"));
}

#[tokio::test]
async fn validated_metadata_hit_is_found() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());

    let query = MetadataQuery::new("ALPHA   study", "1", "10").with_first_author("smith");
    let outcome = db.resolve_by_metadata(&query, true).await.unwrap();
    let record = outcome.record().unwrap();
    assert_eq!(record.doi.as_deref(), Some("10.1000/a"));
    assert_eq!(record.strategy, Some(Strategy::Metadata));
    assert_eq!(record.metadata.as_ref().unwrap().title, "Alpha study");

    // Registered with and without ISSN
    let with_issn = query.clone().with_issn("1234-5678");
    assert!(db.resolve_by_metadata(&with_issn, true).await.unwrap().is_found());
}

#[tokio::test]
async fn title_and_first_author_resolve_without_volume_or_page() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());

    let query = MetadataQuery::new("Alpha study", "", "").with_first_author("Smith");
    let outcome = db.resolve_by_metadata(&query, true).await.unwrap();
    let record = outcome.record().unwrap();
    assert_eq!(record.doi.as_deref(), Some("10.1000/a"));
    assert_eq!(record.strategy, Some(Strategy::Metadata));

    // A wrong volume and page still fall back to title and author
    let misnumbered = MetadataQuery::new("alpha STUDY", "7", "70").with_first_author("smith");
    assert!(db.resolve_by_metadata(&misnumbered, true).await.unwrap().is_found());

    let no_author = MetadataQuery::new("Alpha study", "", "");
    assert_eq!(db.resolve_by_metadata(&no_author, true).await.unwrap(), Outcome::NotFound);
    let other_author = MetadataQuery::new("Alpha study", "", "").with_first_author("Jones");
    assert_eq!(db.resolve_by_metadata(&other_author, true).await.unwrap(), Outcome::NotFound);
}

#[tokio::test]
async fn post_validation_rejects_forced_collision() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());
    // "Beta trial" by Jones now hashes to the record of "Alpha study" by Smith
    let collided = KeyHasher::hash_metadata("Beta trial", "", "2", "20");
    db.indices().biblio.register_key(&collided, "10.1000/a").unwrap();

    let query = MetadataQuery::new("Beta trial", "2", "20").with_first_author("Jones");
    let outcome = db.resolve_by_metadata(&query, true).await.unwrap();
    assert_eq!(outcome, Outcome::Ambiguous { rejected_doi: "10.1000/a".to_string() });
}

#[tokio::test]
async fn on_request_policy_skips_validation_unless_asked() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.validation_policy = ValidationPolicy::OnRequest;
    let (mock, oracle) = shared(MockOracle::new());
    let db = Database::open_with_oracle(config, oracle).unwrap();
    seed(&db);

    let collided = KeyHasher::hash_metadata("Beta trial", "", "2", "20");
    db.indices().biblio.register_key(&collided, "10.1000/a").unwrap();
    let query = MetadataQuery::new("Beta trial", "2", "20").with_first_author("Jones");

    let unchecked = db.resolve_by_metadata(&query, false).await.unwrap();
    assert_eq!(unchecked.record().unwrap().doi.as_deref(), Some("10.1000/a"));
    assert_eq!(mock.call_count(), 0);

    let checked = db.resolve_by_metadata(&query, true).await.unwrap();
    assert!(matches!(checked, Outcome::Ambiguous { .. }));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn raw_citation_uses_embedded_doi_first() {
    let dir = TempDir::new().unwrap();
    let (mock, oracle) = shared(MockOracle::new());
    let db = Database::open_with_oracle(test_config(dir.path()), oracle).unwrap();
    seed(&db);

    let citation = "Ross JD. Gonococcal infection of the rectum. Br J Vener Dis 1977;53:56. doi:10.1136/STI.53.1.56.";
    let outcome = db.resolve_by_raw_citation(citation, true).await.unwrap();
    let record = outcome.record().unwrap();
    assert_eq!(record.doi.as_deref(), Some(STI_DOI));
    assert_eq!(record.strategy, Some(Strategy::ExactDoi));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn raw_citation_hash_is_validated() {
    let dir = TempDir::new().unwrap();
    let oracle = MockOracle::new().with_citation(ALPHA_CITATION, "Alpha study", "Smith");
    let db = open_with_mock(&dir, oracle);

    let outcome = db.resolve_by_raw_citation(ALPHA_CITATION, false).await.unwrap();
    let record = outcome.record().unwrap();
    assert_eq!(record.doi.as_deref(), Some("10.1000/a"));
    assert_eq!(record.strategy, Some(Strategy::RawCitation));

    assert_eq!(
        db.resolve_by_raw_citation("Nobody. Nothing. 2001.", true).await.unwrap(),
        Outcome::NotFound
    );
}

#[tokio::test]
async fn unparsable_citation_is_ambiguous() {
    let dir = TempDir::new().unwrap();
    // The oracle has no answer for this citation and returns an empty extraction
    let db = open_with_mock(&dir, MockOracle::new());
    let outcome = db.resolve_by_raw_citation(ALPHA_CITATION, true).await.unwrap();
    assert_eq!(outcome, Outcome::Ambiguous { rejected_doi: "10.1000/a".to_string() });
}

#[tokio::test]
async fn rejected_candidate_does_not_stop_later_strategies() {
    let dir = TempDir::new().unwrap();
    let oracle = MockOracle::new().with_citation(ALPHA_CITATION, "Alpha study", "Smith");
    let db = open_with_mock(&dir, oracle);
    let collided = KeyHasher::hash_metadata("Beta trial", "", "2", "20");
    db.indices().biblio.register_key(&collided, "10.1000/a").unwrap();

    let request = ResolutionRequest {
        metadata: MetadataQuery::new("Beta trial", "2", "20").with_first_author("Jones"),
        raw_citation: ALPHA_CITATION.to_string(),
        ..ResolutionRequest::default()
    };
    let outcome = db.resolve(&request).await.unwrap();
    assert_eq!(outcome.record().unwrap().strategy, Some(Strategy::RawCitation));

    let request = ResolutionRequest {
        metadata: MetadataQuery::new("Beta trial", "2", "20").with_first_author("Jones"),
        ..ResolutionRequest::default()
    };
    assert!(matches!(db.resolve(&request).await.unwrap(), Outcome::Ambiguous { .. }));

    let empty = ResolutionRequest::default();
    assert_eq!(db.resolve(&empty).await.unwrap_err().kind, ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn missing_oracle_is_reported_not_hidden() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(test_config(dir.path())).unwrap();
    seed(&db);

    let query = MetadataQuery::new("Alpha study", "1", "10").with_first_author("Smith");
    let outcome = db.resolve_by_metadata(&query, true).await.unwrap();
    assert!(matches!(outcome, Outcome::UpstreamUnavailable(_)));
    assert!(matches!(db.health(), HealthStatus::Degraded(_)));
}

#[tokio::test]
async fn oracle_failure_is_retried_once() {
    let dir = TempDir::new().unwrap();
    let (flaky, oracle) = shared(FlakyOracle::new(1));
    let db = Database::open_with_oracle(test_config(dir.path()), oracle).unwrap();
    seed(&db);

    let query = MetadataQuery::new("Alpha study", "1", "10").with_first_author("Smith");
    assert!(db.resolve_by_metadata(&query, true).await.unwrap().is_found());
    assert_eq!(flaky.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn persistent_oracle_failure_is_upstream_unavailable() {
    let dir = TempDir::new().unwrap();
    let (flaky, oracle) = shared(FlakyOracle::new(usize::MAX));
    let db = Database::open_with_oracle(test_config(dir.path()), oracle).unwrap();
    seed(&db);

    let query = MetadataQuery::new("Alpha study", "1", "10").with_first_author("Smith");
    let outcome = db.resolve_by_metadata(&query, true).await.unwrap();
    assert!(matches!(outcome, Outcome::UpstreamUnavailable(_)));
    assert_eq!(flaky.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let (mock, oracle) = shared(MockOracle::new());
    let db = Database::open_with_oracle(test_config(dir.path()), oracle).unwrap();
    seed(&db);

    let query = MetadataQuery::new("Alpha study", "1", "10").with_first_author("Smith");
    assert!(db.resolve_by_metadata(&query, true).await.unwrap().is_found());
    assert!(db.resolve_by_metadata(&query, true).await.unwrap().is_found());
    assert_eq!(mock.call_count(), 1);
    assert_eq!(db.diagnostics().unwrap().cached_extractions, 1);
}

#[test]
fn diagnostics_report_every_index() {
    let dir = TempDir::new().unwrap();
    let db = open_with_mock(&dir, MockOracle::new());

    let diagnostics = db.diagnostics().unwrap();
    assert_eq!(diagnostics.indices.get("pmid_doi2pmid"), Some(&2));
    assert_eq!(diagnostics.indices.get("pmid_doi2pmcid"), Some(&1));
    assert_eq!(diagnostics.indices.get("istex_istex2ids"), Some(&1));
    assert_eq!(diagnostics.indices.get("unpaywall_doi2oaurl"), Some(&1));
    assert_eq!(diagnostics.indices.get("crossref_doi2biblio"), Some(&3));
    assert_eq!(diagnostics.indices.get("crossref_citehash2doi"), Some(&1));
    assert!(diagnostics.oracle_configured);
    assert_eq!(db.health(), HealthStatus::Healthy);

    assert_eq!(db.indices().biblio.sample(2).unwrap().len(), 2);
    assert_eq!(db.indices().pubmed.sample(10).unwrap().len(), 2);
}

#[test]
fn database_reopens_with_its_data() {
    let dir = TempDir::new().unwrap();
    {
        let db = open_with_mock(&dir, MockOracle::new());
        db.close().unwrap();
    }

    let (_, oracle) = shared(MockOracle::new());
    let db = Database::open_with_oracle(test_config(dir.path()), oracle).unwrap();
    assert!(db.resolve_by_doi(STI_DOI).unwrap().is_found());
}
