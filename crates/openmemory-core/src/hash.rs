//! Content hashing and normalization.
//!
//! Hashes are computed over normalized plaintext so that duplicate ingests
//! with trivial whitespace differences deduplicate to the same row.

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            in_ws = true;
            continue;
        }
        if in_ws && !out.is_empty() {
            out.push(' ');
        }
        in_ws = false;
        out.push(ch);
    }
    out
}

/// Hex blake3 digest of the normalized text.
pub fn content_hash(text: &str) -> String {
    blake3::hash(normalize(text).as_bytes()).to_hex().to_string()
}

/// Hex blake3 digest of raw bytes (no normalization). Used for cache keys.
pub fn digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace() {
        assert_eq!(normalize("  a\t b\n\nc  "), "a b c");
    }

    #[test]
    fn whitespace_variants_hash_identically() {
        assert_eq!(
            content_hash("I went to  Paris"),
            content_hash("I went to Paris\n")
        );
    }

    #[test]
    fn distinct_content_hashes_differ() {
        assert_ne!(content_hash("Paris"), content_hash("London"));
    }
}
