//! Pure text predicates shared by the classifier and the retry lists.
//!
//! Matching is case-insensitive. Status codes only match as standalone
//! numeric tokens so `1500ms` never reads as an HTTP 500.

/// A single text pattern.
#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    /// Case-insensitive substring. Must be given in lowercase.
    Phrase(&'static str),
    /// Numeric status code matched on digit boundaries.
    Status(&'static str),
}

impl Pattern {
    /// Test the pattern against already-lowercased text.
    pub fn matches(&self, lowered: &str) -> bool {
        match self {
            Pattern::Phrase(phrase) => lowered.contains(phrase),
            Pattern::Status(code) => contains_status(lowered, code),
        }
    }
}

/// True when any pattern matches `text`.
pub fn matches_any(patterns: &[Pattern], text: &str) -> bool {
    let lowered = text.to_lowercase();
    patterns.iter().any(|p| p.matches(&lowered))
}

/// Find `code` in `text` where neither neighbour is an ASCII digit.
pub fn contains_status(text: &str, code: &str) -> bool {
    let bytes = text.as_bytes();
    text.match_indices(code).any(|(start, matched)| {
        let end = start + matched.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_digit();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_digit();
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_token_boundaries() {
        assert!(contains_status("http 500: internal", "500"));
        assert!(contains_status("500", "500"));
        assert!(contains_status("status=503)", "503"));
        assert!(!contains_status("took 1500ms", "500"));
        assert!(!contains_status("id 5001", "500"));
    }

    #[test]
    fn test_matches_any_is_case_insensitive() {
        let patterns = [Pattern::Phrase("rate limit"), Pattern::Status("429")];
        assert!(matches_any(&patterns, "Rate Limit exceeded"));
        assert!(matches_any(&patterns, "HTTP 429"));
        assert!(!matches_any(&patterns, "HTTP 4290"));
        assert!(!matches_any(&patterns, ""));
    }
}
