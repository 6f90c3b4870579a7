//! Failure tracking subsystem.
//!
//! # Data Flow
//! ```text
//! failure description
//!     → signature.rs (normalize volatile tokens)
//!     → counter.rs (tally per subject + signature, threshold check)
//!
//! success signal
//!     → counter.rs (reset every signature of the subject)
//! ```

pub mod counter;
pub mod signature;

pub use counter::{FailureCounter, FailureRecord, Tally, DEFAULT_FAILURE_LIMIT};
pub use signature::FailureSignature;
