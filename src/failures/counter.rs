//! Per-(subject, signature) failure tally.
//!
//! # Semantics
//! - Records are created lazily on the first failure
//! - Counts never decay; only an explicit reset clears them
//! - Each key is updated under its shard lock, so concurrent increments for
//!   the same key are never lost

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use crate::failures::signature::FailureSignature;

/// Default number of failures before escalation.
pub const DEFAULT_FAILURE_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FailureKey {
    subject: String,
    signature: FailureSignature,
}

impl FailureKey {
    fn new(subject: &str, signature: &FailureSignature) -> Self {
        Self {
            subject: subject.to_string(),
            signature: signature.clone(),
        }
    }
}

/// Result of [`FailureCounter::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Count after this failure was applied.
    pub count: u32,
    /// This failure crossed the limit; the key was cleared in the same step.
    pub tripped: bool,
}

/// A single tracked failure record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub subject: String,
    pub signature: FailureSignature,
    pub count: u32,
}

/// Thread-safe failure counter.
#[derive(Debug)]
pub struct FailureCounter {
    counts: DashMap<FailureKey, u32>,
    limit: AtomicU32,
}

impl FailureCounter {
    pub fn new(limit: u32) -> Self {
        Self {
            counts: DashMap::new(),
            limit: AtomicU32::new(limit.max(1)),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit.load(Ordering::Relaxed)
    }

    /// Change the escalation threshold. Existing counts are kept.
    pub fn set_limit(&self, limit: u32) {
        self.limit.store(limit.max(1), Ordering::Relaxed);
    }

    /// Add one failure and return the new count.
    pub fn increment(&self, subject: &str, signature: &FailureSignature) -> u32 {
        let mut entry = self.counts.entry(FailureKey::new(subject, signature)).or_insert(0);
        *entry = entry.saturating_add(1);
        *entry
    }

    /// Add one failure; if the limit is reached, clear the key atomically.
    ///
    /// Concurrent callers for the same key observe exactly one `tripped`
    /// per crossing of the limit.
    pub fn record(&self, subject: &str, signature: &FailureSignature) -> Tally {
        let limit = self.limit();
        let mut entry = self.counts.entry(FailureKey::new(subject, signature)).or_insert(0);
        let count = entry.saturating_add(1);
        if count >= limit {
            *entry = 0;
            Tally { count, tripped: true }
        } else {
            *entry = count;
            Tally { count, tripped: false }
        }
    }

    /// Current count; zero for unknown keys.
    pub fn count(&self, subject: &str, signature: &FailureSignature) -> u32 {
        self.counts
            .get(&FailureKey::new(subject, signature))
            .map(|r| *r.value())
            .unwrap_or(0)
    }

    pub fn has_reached_limit(&self, subject: &str, signature: &FailureSignature) -> bool {
        self.count(subject, signature) >= self.limit()
    }

    /// Clear one signature, or every signature of `subject` when `None`.
    pub fn reset(&self, subject: &str, signature: Option<&FailureSignature>) {
        match signature {
            Some(signature) => {
                self.counts.remove(&FailureKey::new(subject, signature));
            }
            None => self.counts.retain(|key, _| key.subject != subject),
        }
    }

    /// Sum of counts across all signatures of a subject.
    pub fn subject_total(&self, subject: &str) -> u32 {
        self.counts
            .iter()
            .filter(|r| r.key().subject == subject)
            .map(|r| *r.value())
            .sum()
    }

    /// Snapshot of all non-zero records, sorted by subject then signature.
    pub fn snapshot(&self) -> Vec<FailureRecord> {
        let mut records: Vec<FailureRecord> = self
            .counts
            .iter()
            .filter(|r| *r.value() > 0)
            .map(|r| FailureRecord {
                subject: r.key().subject.clone(),
                signature: r.key().signature.clone(),
                count: *r.value(),
            })
            .collect();
        records.sort_by(|a, b| a.subject.cmp(&b.subject).then_with(|| a.signature.cmp(&b.signature)));
        records
    }
}

impl Default for FailureCounter {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_LIMIT)
    }
}
