//! Approval request types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque approval request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a request. Everything except `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            "EXPIRED" => Ok(ApprovalStatus::Expired),
            other => Err(format!("unknown approval status '{}'", other)),
        }
    }
}

/// A unit of work waiting for a human accept/reject decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub subject_name: String,
    pub failure_description: String,
    pub remediation_suggestions: Vec<String>,
    pub requester_id: String,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_comment: Option<String>,
    /// Thread the request was announced in, set after creation.
    pub thread_ref: Option<String>,
    /// Message inside the thread, set after creation.
    pub message_ref: Option<String>,
}

/// Caller input for a new approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApprovalRequest {
    pub subject_name: String,
    pub failure_description: String,
    #[serde(default)]
    pub remediation_suggestions: Vec<String>,
    pub requester_id: String,
}

impl NewApprovalRequest {
    pub fn new(
        subject_name: impl Into<String>,
        failure_description: impl Into<String>,
        remediation_suggestions: Vec<String>,
        requester_id: impl Into<String>,
    ) -> Self {
        Self {
            subject_name: subject_name.into(),
            failure_description: failure_description.into(),
            remediation_suggestions,
            requester_id: requester_id.into(),
        }
    }

    /// Returns the name of the first blank field.
    pub(crate) fn first_missing_field(&self) -> Option<&'static str> {
        [
            ("subject_name", &self.subject_name),
            ("failure_description", &self.failure_description),
            ("requester_id", &self.requester_id),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Acknowledgement of a processed human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub id: RequestId,
    pub approved: bool,
    pub comment: Option<String>,
    pub processed_at: DateTime<Utc>,
    pub success: bool,
}

/// Predicates for listing requests. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFilter {
    pub status: Option<ApprovalStatus>,
    pub requester_id: Option<String>,
    pub subject_name: Option<String>,
}

impl RequestFilter {
    pub fn with_status(status: ApprovalStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        self.status.map_or(true, |s| s == request.status)
            && self
                .requester_id
                .as_deref()
                .map_or(true, |r| r == request.requester_id)
            && self
                .subject_name
                .as_deref()
                .map_or(true, |s| s == request.subject_name)
    }
}

/// Request counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSummary {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub expired: usize,
}

impl ApprovalSummary {
    pub fn total(&self) -> usize {
        self.pending + self.approved + self.rejected + self.expired
    }
}
