//! Remediation suggestion tables.

use crate::resilience::classifier::{Classification, ErrorCategory};
use crate::resilience::patterns::{matches_any, Pattern};

/// Fixed recommendations attached to every escalation.
pub const ESCALATION_RECOMMENDATIONS: &[&str] = &[
    "Reproduce the failure locally and read the full test output",
    "Review recent changes to the code under test and to the test itself",
    "Check that the test environment and its external dependencies are healthy",
    "Quarantine the test until the root cause is understood",
];

const UI_LOCATOR: &[Pattern] = &[
    Pattern::Phrase("selector"),
    Pattern::Phrase("locator"),
    Pattern::Phrase("element"),
    Pattern::Phrase("button"),
    Pattern::Phrase("not visible"),
    Pattern::Phrase("detached"),
];

const ASSERTION: &[Pattern] = &[
    Pattern::Phrase("expected"),
    Pattern::Phrase("assert"),
    Pattern::Phrase("to equal"),
    Pattern::Phrase("mismatch"),
];

fn category_suggestions(category: ErrorCategory) -> &'static [&'static str] {
    match category {
        ErrorCategory::Network => &[
            "Verify the target service is reachable from the test runner",
            "Retry the run once the network is stable",
        ],
        ErrorCategory::Authentication => &["Refresh the credentials or tokens used by the test"],
        ErrorCategory::Permission => &["Grant the test account the permissions it needs"],
        ErrorCategory::RateLimit => &["Throttle the test run or raise the rate limit for the test account"],
        ErrorCategory::ServerError => &["Inspect the server logs for the failing request"],
        ErrorCategory::ClientError => &["Check the request payload and endpoint used by the test"],
        ErrorCategory::Timeout => &[
            "Increase the wait timeout for the slow step",
            "Replace fixed sleeps with explicit waits",
        ],
        ErrorCategory::Unknown => &[],
    }
}

/// Ordered, de-duplicated suggestions for an approval request.
pub fn suggestions_for(classification: &Classification, failure_description: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        if !out.iter().any(|existing| existing == s) {
            out.push(s.to_string());
        }
    };

    if matches_any(UI_LOCATOR, failure_description) {
        push("Update the element selector to match the current page");
    }
    if matches_any(ASSERTION, failure_description) {
        push("Confirm whether the expected value changed intentionally and update the assertion");
    }
    for s in category_suggestions(classification.category) {
        push(s);
    }
    out
}
