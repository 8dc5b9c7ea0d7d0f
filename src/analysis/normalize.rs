use unicode_segmentation::UnicodeSegmentation;

/// Canonical form of a metadata field used for hashing: trimmed,
/// lower-cased, internal whitespace runs collapsed to one space.
/// Idempotent.
pub fn normalize_field(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// Lower-cased words with punctuation dropped. Used by post-validation.
pub fn match_words(raw: &str) -> Vec<String> {
    raw.unicode_words()
        .map(str::to_lowercase)
        .collect()
}

/// Case- and punctuation-insensitive comparison: equal, or one side's
/// word sequence appears contiguously in the other. Blank never matches.
pub fn fields_match(left: &str, right: &str) -> bool {
    let left = match_words(left);
    let right = match_words(right);
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left == right || contains_words(&left, &right) || contains_words(&right, &left)
}

fn contains_words(haystack: &[String], needle: &[String]) -> bool {
    needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}
