//! Remediation gate library.
//!
//! Counts repeated test failures per subject, routes each failure through a
//! human approval request, and escalates to a person once the same failure
//! keeps recurring.

pub mod admin;
pub mod approval;
pub mod clock;
pub mod config;
pub mod error;
pub mod escalation;
pub mod failures;
pub mod lifecycle;
pub mod notify;
pub mod observability;
pub mod resilience;

pub use approval::{ApprovalManager, ApprovalRequest, ApprovalStatus, RequestId};
pub use config::GateConfig;
pub use error::{GateError, GateResult};
pub use escalation::{Escalator, FailureOutcome};
pub use lifecycle::Shutdown;
