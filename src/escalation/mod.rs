//! Failure escalation subsystem.
//!
//! # Data Flow
//! ```text
//! failure / success events
//!     → orchestrator.rs (Escalator: counting, approvals, notifications)
//!         → suggestions.rs (remediation hints per classification)
//!         → history.rs (bounded outcome log for stats)
//!
//! Background:
//!     sweeper.rs ticks → Escalator::sweep_expired
//! ```
//!
//! # Design Decisions
//! - Counting, the limit check and the reset are one atomic step per key,
//!   so concurrent events escalate exactly once
//! - Collaborator failures degrade to a fallback report and never reach the caller

pub mod history;
pub mod orchestrator;
pub mod suggestions;
pub mod sweeper;

pub use history::{EscalationHistory, HistoryEntry, HistoryStats, OutcomeKind};
pub use orchestrator::{Escalator, EscalatorBuilder, FailureOutcome, GateStats};
pub use suggestions::{suggestions_for, ESCALATION_RECOMMENDATIONS};
pub use sweeper::ExpirySweeper;
