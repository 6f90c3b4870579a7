//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Collaborator call fails:
//!     → retries.rs (eligibility lists, backoff, bounded attempts)
//!     → backoff.rs (fixed or jittered exponential delay)
//!
//! Failure reporting:
//!     → classifier.rs (category, severity, transience + occurrence stats)
//! ```
//!
//! # Design Decisions
//! - Classification and retry eligibility use separate pattern tables that
//!   agree on meaning; the retry handler never consults the classifier
//! - Unrecognized failures are not retried
//! - Delays are suspended through a pluggable sleeper so tests never sleep

pub mod backoff;
pub mod classifier;
pub mod patterns;
pub mod retries;

pub use backoff::{BackoffKind, BackoffPolicy, ExponentialBackoff};
pub use classifier::{Classification, ErrorCategory, ErrorClassifier, Severity};
pub use retries::{RecordingSleeper, RetryHandler, RetryOptions, Sleeper, TokioSleeper};
