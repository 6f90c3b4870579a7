//! Notification payloads.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::approval::types::{ApprovalRequest, ApprovalStatus, RequestId};
use crate::resilience::classifier::Classification;

/// What a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Failure limit reached; automation stops for this subject.
    HumanJudgmentRequired,
    /// Plain failure report used when the approval flow could not run.
    FailureReport,
    /// A human approved or rejected a request.
    DecisionRecorded,
    /// A request's approval window closed without a decision.
    RequestExpired,
}

/// Rendered notification content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub subject: String,
    pub title: String,
    pub body: String,
    pub request_id: Option<RequestId>,
    /// Thread to post into, when the request has one.
    pub thread_ref: Option<String>,
    pub failure_count: Option<u32>,
}

impl Notification {
    /// Escalation signal carrying the failure count and fixed recommendations.
    pub fn human_judgment_required(
        subject: &str,
        failure_description: &str,
        failure_count: u32,
        classification: &Classification,
        recommendations: &[&str],
    ) -> Self {
        let mut body = format!(
            "`{}` failed {} times with the same error ({} / {}).\n\n> {}\n\nRecommended next steps:\n",
            subject,
            failure_count,
            classification.category,
            classification.severity,
            failure_description.trim()
        );
        for item in recommendations {
            let _ = writeln!(body, "- {}", item);
        }
        Self {
            kind: NotificationKind::HumanJudgmentRequired,
            subject: subject.to_string(),
            title: format!("Human judgment required: {}", subject),
            body,
            request_id: None,
            thread_ref: None,
            failure_count: Some(failure_count),
        }
    }

    /// Plain failure report without an approval request.
    pub fn failure_report(subject: &str, failure_description: &str, failure_count: u32) -> Self {
        Self {
            kind: NotificationKind::FailureReport,
            subject: subject.to_string(),
            title: format!("Test failure: {}", subject),
            body: format!(
                "`{}` failed (occurrence {}).\n\n> {}\n\nApproval workflow unavailable; please review manually.",
                subject,
                failure_count,
                failure_description.trim()
            ),
            request_id: None,
            thread_ref: None,
            failure_count: Some(failure_count),
        }
    }

    /// Decision posted back into the request's thread.
    pub fn decision_recorded(request: &ApprovalRequest) -> Self {
        let verdict = match request.status {
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            _ => "updated",
        };
        let mut body = format!("Remediation for `{}` was {}.", request.subject_name, verdict);
        if let Some(comment) = request.response_comment.as_deref().filter(|c| !c.trim().is_empty()) {
            let _ = write!(body, "\n\n> {}", comment.trim());
        }
        Self {
            kind: NotificationKind::DecisionRecorded,
            subject: request.subject_name.clone(),
            title: format!("Request {} {}", request.id, verdict),
            body,
            request_id: Some(request.id),
            thread_ref: request.thread_ref.clone(),
            failure_count: None,
        }
    }

    /// Expiry notice posted into the request's thread.
    pub fn request_expired(request: &ApprovalRequest) -> Self {
        Self {
            kind: NotificationKind::RequestExpired,
            subject: request.subject_name.clone(),
            title: format!("Request {} expired", request.id),
            body: format!(
                "No decision on `{}` before {}. The remediation was not applied.",
                request.subject_name, request.expires_at
            ),
            request_id: Some(request.id),
            thread_ref: request.thread_ref.clone(),
            failure_count: None,
        }
    }
}
