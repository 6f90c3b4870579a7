//! Failure classification.
//!
//! # Rules
//! An ordered rule table is evaluated top to bottom; the first rule whose
//! patterns match decides category, severity and transience.
//!
//! ```text
//! network → authentication → permission → rate limit
//!         → server error → client error → timeout → UNKNOWN
//! ```
//!
//! Occurrence counters are kept per category for reporting. They never feed
//! back into a classification.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::observability::metrics;
use crate::resilience::patterns::{matches_any, Pattern};

/// Failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Network,
    Authentication,
    Permission,
    RateLimit,
    ServerError,
    ClientError,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 8] = [
        ErrorCategory::Network,
        ErrorCategory::Authentication,
        ErrorCategory::Permission,
        ErrorCategory::RateLimit,
        ErrorCategory::ServerError,
        ErrorCategory::ClientError,
        ErrorCategory::Timeout,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::Authentication => "AUTHENTICATION",
            ErrorCategory::Permission => "PERMISSION",
            ErrorCategory::RateLimit => "RATE_LIMIT",
            ErrorCategory::ServerError => "SERVER_ERROR",
            ErrorCategory::ClientError => "CLIENT_ERROR",
            ErrorCategory::Timeout => "TIMEOUT",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Outcome of classifying one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub transient: bool,
}

impl Classification {
    pub const UNKNOWN: Classification = Classification {
        category: ErrorCategory::Unknown,
        severity: Severity::Medium,
        transient: false,
    };
}

struct Rule {
    patterns: &'static [Pattern],
    classification: Classification,
}

const NETWORK: &[Pattern] = &[
    Pattern::Phrase("econnrefused"),
    Pattern::Phrase("econnreset"),
    Pattern::Phrase("enotfound"),
    Pattern::Phrase("enetunreach"),
    Pattern::Phrase("ehostunreach"),
    Pattern::Phrase("epipe"),
    Pattern::Phrase("socket hang up"),
    Pattern::Phrase("connection refused"),
    Pattern::Phrase("connection reset"),
    Pattern::Phrase("connection closed"),
    Pattern::Phrase("dns"),
    Pattern::Phrase("network"),
    Pattern::Phrase("transport error"),
];

const AUTHENTICATION: &[Pattern] = &[
    Pattern::Status("401"),
    Pattern::Phrase("unauthorized"),
    Pattern::Phrase("unauthenticated"),
    Pattern::Phrase("authentication"),
    Pattern::Phrase("invalid token"),
    Pattern::Phrase("invalid credentials"),
    Pattern::Phrase("token expired"),
];

const PERMISSION: &[Pattern] = &[
    Pattern::Status("403"),
    Pattern::Phrase("forbidden"),
    Pattern::Phrase("permission denied"),
    Pattern::Phrase("missing permissions"),
    Pattern::Phrase("missing access"),
    Pattern::Phrase("eacces"),
    Pattern::Phrase("access denied"),
];

const RATE_LIMIT: &[Pattern] = &[
    Pattern::Status("429"),
    Pattern::Phrase("rate limit"),
    Pattern::Phrase("ratelimit"),
    Pattern::Phrase("rate-limit"),
    Pattern::Phrase("too many requests"),
    Pattern::Phrase("quota exceeded"),
];

const SERVER_ERROR: &[Pattern] = &[
    Pattern::Status("500"),
    Pattern::Status("502"),
    Pattern::Status("503"),
    Pattern::Status("504"),
    Pattern::Phrase("internal server error"),
    Pattern::Phrase("bad gateway"),
    Pattern::Phrase("service unavailable"),
    Pattern::Phrase("gateway timeout"),
];

const CLIENT_ERROR: &[Pattern] = &[
    Pattern::Status("400"),
    Pattern::Status("404"),
    Pattern::Status("405"),
    Pattern::Status("409"),
    Pattern::Status("422"),
    Pattern::Phrase("bad request"),
    Pattern::Phrase("not found"),
    Pattern::Phrase("unprocessable"),
    Pattern::Phrase("validation"),
    Pattern::Phrase("invalid"),
];

const TIMEOUT: &[Pattern] = &[
    Pattern::Phrase("timeout"),
    Pattern::Phrase("timed out"),
    Pattern::Phrase("etimedout"),
    Pattern::Phrase("deadline exceeded"),
];

const RULES: [Rule; 7] = [
    Rule {
        patterns: NETWORK,
        classification: Classification {
            category: ErrorCategory::Network,
            severity: Severity::Medium,
            transient: true,
        },
    },
    Rule {
        patterns: AUTHENTICATION,
        classification: Classification {
            category: ErrorCategory::Authentication,
            severity: Severity::Critical,
            transient: false,
        },
    },
    Rule {
        patterns: PERMISSION,
        classification: Classification {
            category: ErrorCategory::Permission,
            severity: Severity::High,
            transient: false,
        },
    },
    Rule {
        patterns: RATE_LIMIT,
        classification: Classification {
            category: ErrorCategory::RateLimit,
            severity: Severity::Low,
            transient: true,
        },
    },
    Rule {
        patterns: SERVER_ERROR,
        classification: Classification {
            category: ErrorCategory::ServerError,
            severity: Severity::High,
            transient: true,
        },
    },
    Rule {
        patterns: CLIENT_ERROR,
        classification: Classification {
            category: ErrorCategory::ClientError,
            severity: Severity::Medium,
            transient: false,
        },
    },
    Rule {
        patterns: TIMEOUT,
        classification: Classification {
            category: ErrorCategory::Timeout,
            severity: Severity::Medium,
            transient: true,
        },
    },
];

/// Per-category occurrence report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierStats {
    pub total: u64,
    pub by_category: BTreeMap<ErrorCategory, u64>,
}

/// Categorizes failures by their textual description.
#[derive(Debug, Default)]
pub struct ErrorClassifier {
    occurrences: [AtomicU64; 8],
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a failure description. Never fails; empty text is UNKNOWN.
    pub fn classify(&self, failure: &str) -> Classification {
        let result = Self::evaluate(failure);
        self.occurrences[result.category.index()].fetch_add(1, Ordering::Relaxed);
        metrics::record_classification(result.category.as_str());
        result
    }

    /// Classify any displayable error.
    pub fn classify_error<E: fmt::Display + ?Sized>(&self, err: &E) -> Classification {
        self.classify(&err.to_string())
    }

    pub fn is_transient(&self, failure: &str) -> bool {
        self.classify(failure).transient
    }

    pub fn severity(&self, failure: &str) -> Severity {
        self.classify(failure).severity
    }

    /// Snapshot of occurrence counters.
    pub fn stats(&self) -> ClassifierStats {
        let mut stats = ClassifierStats::default();
        for category in ErrorCategory::ALL {
            let count = self.occurrences[category.index()].load(Ordering::Relaxed);
            stats.total += count;
            if count > 0 {
                stats.by_category.insert(category, count);
            }
        }
        stats
    }

    pub fn reset_stats(&self) {
        for counter in &self.occurrences {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn evaluate(failure: &str) -> Classification {
        if failure.trim().is_empty() {
            return Classification::UNKNOWN;
        }
        RULES
            .iter()
            .find(|rule| matches_any(rule.patterns, failure))
            .map(|rule| rule.classification)
            .unwrap_or(Classification::UNKNOWN)
    }
}
