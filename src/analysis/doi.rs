use std::sync::LazyLock;
use regex::Regex;

// Resolver prefixes stripped before lookup, compared on the lower-cased input
const DOI_PREFIXES: [&str; 5] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

static DOI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"10\.\d{4,9}/[^\s"<>]*[^\s"<>;,.)\]]"#).expect("DOI pattern is valid")
});

/// Lookup form of a DOI: trimmed, resolver prefix removed, lower-cased.
pub fn normalize_doi(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut rest = lowered.as_str();
    while let Some(prefix) = DOI_PREFIXES.iter().find(|p| rest.starts_with(**p)) {
        rest = rest[prefix.len()..].trim_start();
    }
    rest.to_string()
}

/// First DOI found inside free text, e.g. a raw citation string.
pub fn extract_doi(text: &str) -> Option<String> {
    DOI_PATTERN.find(text).map(|m| normalize_doi(m.as_str()))
}

/// `"PMC"` prefixed PMCID; bare numbers get the prefix added.
pub fn normalize_pmcid(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits = match trimmed.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("pmc") => &trimmed[3..],
        _ => trimmed,
    };
    format!("PMC{}", digits.trim())
}

/// Keys of every cross-reference index are stored lower-cased.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}
