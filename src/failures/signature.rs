//! Failure signature normalization.
//!
//! Two descriptions that differ only in volatile details (ids, durations,
//! line numbers) produce the same signature, so a flapping test with a
//! changing timestamp in its message still counts as one recurring failure.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const MAX_SIGNATURE_LEN: usize = 200;

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("uuid pattern is valid")
    })
}

fn hex_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"0x[0-9a-f]+").expect("static pattern is valid"))
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static pattern is valid"))
}

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static pattern is valid"))
}

/// Normalized error description used as a failure-counter key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureSignature(String);

impl FailureSignature {
    /// Normalize a raw failure description.
    pub fn from_description(description: &str) -> Self {
        let first_line = description
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("");
        let lowered = first_line.to_lowercase();
        let masked = uuid_re().replace_all(&lowered, "<uuid>");
        let masked = hex_re().replace_all(&masked, "<hex>");
        let masked = number_re().replace_all(&masked, "#");
        let collapsed = space_re().replace_all(&masked, " ");

        let mut signature: String = collapsed.trim().chars().take(MAX_SIGNATURE_LEN).collect();
        if signature.is_empty() {
            signature.push_str("<empty>");
        }
        Self(signature)
    }

    /// Use `raw` verbatim.
    pub fn raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FailureSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FailureSignature {
    fn from(description: &str) -> Self {
        Self::from_description(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatile_tokens_masked() {
        let a = FailureSignature::from_description("Timeout 5012ms waiting for #submit (run 41)");
        let b = FailureSignature::from_description("Timeout 4980ms waiting for #submit (run 42)");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "timeout #ms waiting for #submit (run #)");
    }

    #[test]
    fn test_uuid_and_hex() {
        let s = FailureSignature::from_description(
            "session 0b6c0f9e-3f4a-4c1e-9a57-2d7f1c9b8e11 crashed at 0xdeadbeef",
        );
        assert_eq!(s.as_str(), "session <uuid> crashed at <hex>");
    }

    #[test]
    fn test_first_line_and_whitespace() {
        let s = FailureSignature::from_description("\n  Button   NOT found \n    at login.spec.ts:12:5");
        assert_eq!(s.as_str(), "button not found");
    }

    #[test]
    fn test_distinct_causes_stay_distinct() {
        let a = FailureSignature::from_description("button not found");
        let b = FailureSignature::from_description("page crashed");
        assert_ne!(a, b);
        assert_eq!(FailureSignature::from_description("").as_str(), "<empty>");
    }

    #[test]
    fn test_truncation() {
        let long = "x".repeat(500);
        assert_eq!(FailureSignature::from_description(&long).as_str().len(), MAX_SIGNATURE_LEN);
    }
}
