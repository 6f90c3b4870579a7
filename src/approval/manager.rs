//! Approval request manager.
//!
//! # State Transitions
//! ```text
//! PENDING → APPROVED: process_response(approved = true)
//! PENDING → REJECTED: process_response(approved = false)
//! PENDING → EXPIRED:  process_timeouts() after expires_at, or force_expire()
//! ```
//!
//! # Concurrency
//! - Every transition is a check-and-set under the request's shard write
//!   lock, so a request leaves PENDING exactly once
//! - The expiry timer is disarmed after the winning transition commits;
//!   disarming an already fired timer is a no-op
//! - The schedule lock and a shard lock are never held together

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::approval::schedule::ExpirySchedule;
use crate::approval::types::{
    ApprovalRequest, ApprovalResponse, ApprovalStatus, ApprovalSummary, NewApprovalRequest,
    RequestFilter, RequestId,
};
use crate::clock::{Clock, SystemClock};
use crate::error::{GateError, GateResult};
use crate::observability::metrics;
use crate::resilience::retries::RetryHandler;

/// Default approval window.
pub const DEFAULT_APPROVAL_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Upper bound on the approval window; keeps deadline arithmetic in range.
pub const MAX_APPROVAL_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Owns approval requests, their status transitions and expiry timers.
#[derive(Clone)]
pub struct ApprovalManager {
    requests: Arc<DashMap<RequestId, ApprovalRequest>>,
    schedule: Arc<Mutex<ExpirySchedule>>,
    clock: Arc<dyn Clock>,
    window: Duration,
    retry: RetryHandler,
}

impl ApprovalManager {
    pub fn new(clock: Arc<dyn Clock>, window: Duration, retry: RetryHandler) -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            schedule: Arc::new(Mutex::new(ExpirySchedule::new())),
            clock,
            window,
            retry,
        }
    }

    /// System clock, 24 hour window, default retry policy.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Duration::seconds(DEFAULT_APPROVAL_WINDOW_SECS),
            RetryHandler::default(),
        )
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validate input, store a PENDING request and arm its expiry timer.
    pub fn create_request(&self, input: NewApprovalRequest) -> GateResult<ApprovalRequest> {
        if let Some(field) = input.first_missing_field() {
            return Err(GateError::Validation(format!("{} must be a non-empty string", field)));
        }

        let created_at = self.clock.now();
        let request = ApprovalRequest {
            id: RequestId::new(),
            subject_name: input.subject_name,
            failure_description: input.failure_description,
            remediation_suggestions: input.remediation_suggestions,
            requester_id: input.requester_id,
            status: ApprovalStatus::Pending,
            created_at,
            expires_at: created_at + self.window,
            responded_at: None,
            response_comment: None,
            thread_ref: None,
            message_ref: None,
        };

        self.requests.insert(request.id, request.clone());
        let pending = {
            let mut schedule = self.lock_schedule();
            schedule.schedule(request.id, request.expires_at);
            schedule.len()
        };
        metrics::record_pending_requests(pending);

        tracing::info!(
            request_id = %request.id,
            subject = %request.subject_name,
            requester = %request.requester_id,
            expires_at = %request.expires_at,
            "Approval request created"
        );
        Ok(request)
    }

    /// Look up a request. `None` for unknown ids.
    pub fn get_request(&self, id: &RequestId) -> Option<ApprovalRequest> {
        self.requests.get(id).map(|r| r.value().clone())
    }

    /// All requests matching `filter`, oldest first.
    pub fn get_all_requests(&self, filter: &RequestFilter) -> Vec<ApprovalRequest> {
        let mut matched: Vec<ApprovalRequest> = self
            .requests
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        matched.sort_by_key(|r| r.created_at);
        matched
    }

    /// Record a human decision on a PENDING request.
    ///
    /// A request found past its deadline is expired on the spot and the
    /// response is refused.
    pub fn process_response(
        &self,
        id: &RequestId,
        approved: bool,
        comment: Option<String>,
    ) -> GateResult<ApprovalResponse> {
        let now = self.clock.now();
        let status = {
            let mut entry = self.requests.get_mut(id).ok_or(GateError::NotFound(*id))?;
            if entry.status != ApprovalStatus::Pending {
                return Err(GateError::AlreadyProcessed {
                    id: *id,
                    status: entry.status,
                });
            }
            if entry.expires_at <= now {
                entry.status = ApprovalStatus::Expired;
                ApprovalStatus::Expired
            } else {
                entry.status = if approved {
                    ApprovalStatus::Approved
                } else {
                    ApprovalStatus::Rejected
                };
                entry.responded_at = Some(now);
                entry.response_comment = comment.clone();
                entry.status
            }
        };

        self.disarm(id);
        metrics::record_approval_transition(status.as_str());

        if status == ApprovalStatus::Expired {
            tracing::warn!(request_id = %id, "Response arrived after the approval window closed");
            return Err(GateError::AlreadyProcessed { id: *id, status });
        }

        tracing::info!(request_id = %id, status = %status, "Approval response recorded");
        Ok(ApprovalResponse {
            id: *id,
            approved,
            comment,
            processed_at: now,
            success: true,
        })
    }

    /// Expire every PENDING request whose deadline has passed.
    ///
    /// Safe to call concurrently with itself and with `process_response`;
    /// each id is reported by at most one caller.
    pub fn process_timeouts(&self) -> Vec<RequestId> {
        let now = self.clock.now();
        let (due, pending) = {
            let mut schedule = self.lock_schedule();
            let due = schedule.pop_due(now);
            (due, schedule.len())
        };

        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            if let Some(mut entry) = self.requests.get_mut(&id) {
                if entry.status == ApprovalStatus::Pending && entry.expires_at <= now {
                    entry.status = ApprovalStatus::Expired;
                    expired.push(id);
                }
            }
        }

        if !expired.is_empty() {
            for _ in &expired {
                metrics::record_approval_transition(ApprovalStatus::Expired.as_str());
            }
            tracing::info!(count = expired.len(), "Expired approval requests");
        }
        metrics::record_pending_requests(pending);
        expired
    }

    /// Expire a PENDING request now, regardless of its deadline.
    pub fn force_expire(&self, id: &RequestId) -> GateResult<ApprovalRequest> {
        let request = {
            let mut entry = self.requests.get_mut(id).ok_or(GateError::NotFound(*id))?;
            if entry.status != ApprovalStatus::Pending {
                return Err(GateError::AlreadyProcessed {
                    id: *id,
                    status: entry.status,
                });
            }
            entry.status = ApprovalStatus::Expired;
            entry.clone()
        };
        self.disarm(id);
        metrics::record_approval_transition(ApprovalStatus::Expired.as_str());
        tracing::info!(request_id = %id, "Approval request force-expired");
        Ok(request)
    }

    /// Remove a request and disarm its timer. Returns whether it existed.
    pub fn delete_request(&self, id: &RequestId) -> bool {
        let existed = self.requests.remove(id).is_some();
        self.disarm(id);
        if existed {
            tracing::info!(request_id = %id, "Approval request deleted");
        }
        existed
    }

    /// Attach the collaborator's thread/message references to a request.
    ///
    /// The store write runs under the retry policy. With the in-memory store
    /// it can only fail with NotFound, which is never retried, so a call
    /// completes in one attempt. Transient collaborator failures are retried
    /// earlier, around `ThreadProvider::create_thread`.
    pub async fn update_thread_info(
        &self,
        id: &RequestId,
        thread_ref: &str,
        message_ref: &str,
    ) -> GateResult<ApprovalRequest> {
        if thread_ref.trim().is_empty() {
            return Err(GateError::Validation("thread_ref must be a non-empty string".into()));
        }
        if message_ref.trim().is_empty() {
            return Err(GateError::Validation("message_ref must be a non-empty string".into()));
        }

        self.retry
            .retry("update_thread_info", move || async move {
                self.store_thread_info(id, thread_ref, message_ref)
            })
            .await
    }

    /// Ids of PENDING requests for a subject.
    pub fn pending_for_subject(&self, subject: &str) -> Vec<RequestId> {
        self.requests
            .iter()
            .filter(|r| r.status == ApprovalStatus::Pending && r.subject_name == subject)
            .map(|r| *r.key())
            .collect()
    }

    /// Request counts per status.
    pub fn summary(&self) -> ApprovalSummary {
        let mut summary = ApprovalSummary::default();
        for r in self.requests.iter() {
            match r.status {
                ApprovalStatus::Pending => summary.pending += 1,
                ApprovalStatus::Approved => summary.approved += 1,
                ApprovalStatus::Rejected => summary.rejected += 1,
                ApprovalStatus::Expired => summary.expired += 1,
            }
        }
        summary
    }

    /// Number of armed expiry timers.
    pub fn armed_timers(&self) -> usize {
        self.lock_schedule().len()
    }

    fn store_thread_info(
        &self,
        id: &RequestId,
        thread_ref: &str,
        message_ref: &str,
    ) -> GateResult<ApprovalRequest> {
        let mut entry = self.requests.get_mut(id).ok_or(GateError::NotFound(*id))?;
        entry.thread_ref = Some(thread_ref.to_string());
        entry.message_ref = Some(message_ref.to_string());
        Ok(entry.clone())
    }

    fn disarm(&self, id: &RequestId) {
        let pending = {
            let mut schedule = self.lock_schedule();
            schedule.cancel(id);
            schedule.len()
        };
        metrics::record_pending_requests(pending);
    }

    fn lock_schedule(&self) -> MutexGuard<'_, ExpirySchedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
