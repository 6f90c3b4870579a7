//! Bounded record of failure-event outcomes.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::failures::signature::FailureSignature;

/// Default number of entries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// How a failure event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    ApprovalRequested,
    Escalated,
    FallbackReported,
    Unreported,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::ApprovalRequested => "approval_requested",
            OutcomeKind::Escalated => "escalated",
            OutcomeKind::FallbackReported => "fallback_reported",
            OutcomeKind::Unreported => "unreported",
        }
    }
}

/// One handled failure event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub subject: String,
    pub signature: FailureSignature,
    pub outcome: OutcomeKind,
    pub failure_count: u32,
    pub at: DateTime<Utc>,
}

/// Aggregate report over the retained history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_events: usize,
    pub approvals_requested: usize,
    pub escalations: usize,
    pub fallbacks: usize,
    pub unreported: usize,
    /// Share of events that reached a human through the approval flow, in percent.
    pub approval_rate: f64,
    pub recent_24h_events: usize,
    pub subjects: Vec<String>,
}

/// Thread-safe ring buffer of outcomes.
#[derive(Debug)]
pub struct EscalationHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    limit: usize,
}

impl EscalationHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }

    pub fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.limit {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Most recent entries, newest last.
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self, now: DateTime<Utc>) -> HistoryStats {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let cutoff = now - Duration::hours(24);
        let mut stats = HistoryStats {
            total_events: entries.len(),
            ..HistoryStats::default()
        };
        let mut subjects = BTreeSet::new();
        for entry in entries.iter() {
            match entry.outcome {
                OutcomeKind::ApprovalRequested => stats.approvals_requested += 1,
                OutcomeKind::Escalated => stats.escalations += 1,
                OutcomeKind::FallbackReported => stats.fallbacks += 1,
                OutcomeKind::Unreported => stats.unreported += 1,
            }
            if entry.at > cutoff {
                stats.recent_24h_events += 1;
            }
            subjects.insert(entry.subject.clone());
        }
        if stats.total_events > 0 {
            stats.approval_rate = stats.approvals_requested as f64 / stats.total_events as f64 * 100.0;
        }
        stats.subjects = subjects.into_iter().collect();
        stats
    }
}

impl Default for EscalationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
