//! Approval subsystem.
//!
//! # Data Flow
//! ```text
//! create_request
//!     → types.rs (validated NewApprovalRequest → PENDING ApprovalRequest)
//!     → schedule.rs (arm expiry timer at created_at + window)
//!
//! process_response / process_timeouts / force_expire
//!     → manager.rs (check-and-set under the request's shard lock)
//!     → schedule.rs (disarm timer)
//! ```
//!
//! # Design Decisions
//! - One sweep drains a min-heap of deadlines instead of one task per request
//! - The approval window is a hard deadline from creation, not from activity
//! - State lives in memory for the process lifetime

pub mod manager;
pub mod schedule;
pub mod types;

pub use manager::{ApprovalManager, DEFAULT_APPROVAL_WINDOW_SECS, MAX_APPROVAL_WINDOW_SECS};
pub use types::{
    ApprovalRequest, ApprovalResponse, ApprovalStatus, ApprovalSummary, NewApprovalRequest,
    RequestFilter, RequestId,
};
