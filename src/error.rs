//! Error taxonomy for the remediation gate.
//!
//! # Propagation
//! - Validation / NotFound / AlreadyProcessed are caller errors and surface
//!   immediately, never retried.
//! - Infrastructure errors come from collaborators; only the retry handler
//!   reasons about whether they are worth another attempt.

use thiserror::Error;

use crate::approval::types::{ApprovalStatus, RequestId};
use crate::resilience::classifier::ErrorClassifier;

/// Errors raised by the remediation core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// Malformed caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown approval request id.
    #[error("approval request not found: {0}")]
    NotFound(RequestId),

    /// The request already left the PENDING state.
    #[error("approval request {id} already processed (status: {status})")]
    AlreadyProcessed { id: RequestId, status: ApprovalStatus },

    /// Collaborator failure that is likely to succeed on retry.
    #[error("transient infrastructure error: {0}")]
    TransientInfrastructure(String),

    /// Collaborator failure that will not go away by retrying.
    #[error("permanent infrastructure error: {0}")]
    PermanentInfrastructure(String),
}

impl GateError {
    /// Wrap a collaborator failure, picking the variant from its classification.
    pub fn infrastructure<E: std::fmt::Display>(err: &E, classifier: &ErrorClassifier) -> Self {
        let message = err.to_string();
        if classifier.classify(&message).transient {
            GateError::TransientInfrastructure(message)
        } else {
            GateError::PermanentInfrastructure(message)
        }
    }

    /// True for errors that indicate the caller did something wrong.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            GateError::Validation(_) | GateError::NotFound(_) | GateError::AlreadyProcessed { .. }
        )
    }
}

/// Result type for remediation operations.
pub type GateResult<T> = Result<T, GateError>;
