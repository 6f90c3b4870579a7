//! Escalation orchestrator.
//!
//! # Failure Event Flow
//! ```text
//! on_failure(subject, description)
//!     → signature + classification
//!     → FailureCounter::record
//!         → limit reached: human-judgment signal, reset subject counters
//!         → otherwise: create approval request
//!             → retry(create_thread) → attach thread refs
//!             → on failure: drop request, retry(plain failure report)
//!
//! on_success(subject)
//!     → reset subject counters
//! ```
//!
//! Neither entry point returns an error: pipeline failures degrade to a
//! fallback report plus logging so the triggering test run never blocks.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::approval::manager::{ApprovalManager, MAX_APPROVAL_WINDOW_SECS};
use crate::approval::types::{ApprovalResponse, ApprovalSummary, NewApprovalRequest, RequestId};
use crate::clock::{Clock, SystemClock};
use crate::config::{EscalationConfig, GateConfig, PendingPolicy};
use crate::error::{GateError, GateResult};
use crate::escalation::history::{EscalationHistory, HistoryEntry, HistoryStats, OutcomeKind};
use crate::escalation::suggestions::{suggestions_for, ESCALATION_RECOMMENDATIONS};
use crate::failures::counter::{FailureCounter, FailureRecord};
use crate::failures::signature::FailureSignature;
use crate::notify::{Notification, NotificationChannel, ThreadProvider};
use crate::observability::metrics;
use crate::resilience::classifier::{Classification, ClassifierStats, ErrorClassifier};
use crate::resilience::retries::{RetryHandler, RetryOptions, Sleeper, TokioSleeper};

/// How a failure event was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FailureOutcome {
    /// An approval request was created and announced.
    ApprovalRequested { request_id: RequestId, failure_count: u32 },
    /// The failure limit was reached and a human was asked to take over.
    Escalated {
        failure_count: u32,
        notified: bool,
        expired_requests: Vec<RequestId>,
    },
    /// The approval flow failed; a plain failure report went out instead.
    FallbackReported { failure_count: u32, reason: String },
    /// Neither the approval flow nor the fallback report got through.
    Unreported { failure_count: u32, reason: String },
}

impl FailureOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            FailureOutcome::ApprovalRequested { .. } => OutcomeKind::ApprovalRequested,
            FailureOutcome::Escalated { .. } => OutcomeKind::Escalated,
            FailureOutcome::FallbackReported { .. } => OutcomeKind::FallbackReported,
            FailureOutcome::Unreported { .. } => OutcomeKind::Unreported,
        }
    }

    pub fn failure_count(&self) -> u32 {
        match self {
            FailureOutcome::ApprovalRequested { failure_count, .. }
            | FailureOutcome::Escalated { failure_count, .. }
            | FailureOutcome::FallbackReported { failure_count, .. }
            | FailureOutcome::Unreported { failure_count, .. } => *failure_count,
        }
    }
}

/// Point-in-time report across all components.
#[derive(Debug, Clone, Serialize)]
pub struct GateStats {
    pub approvals: ApprovalSummary,
    pub failure_limit: u32,
    pub failures: Vec<FailureRecord>,
    pub classifier: ClassifierStats,
    pub history: HistoryStats,
}

/// Builder wiring collaborators and configuration into an [`Escalator`].
pub struct EscalatorBuilder {
    channel: Arc<dyn NotificationChannel>,
    threads: Arc<dyn ThreadProvider>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    classifier: Arc<ErrorClassifier>,
    config: GateConfig,
}

impl EscalatorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn classifier(mut self, classifier: Arc<ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Escalator {
        let retry = RetryHandler::with_sleeper(RetryOptions::from(&self.config.retries), self.sleeper);
        let window = Duration::seconds(self.config.approval.window_secs.min(MAX_APPROVAL_WINDOW_SECS) as i64);
        let approvals = ApprovalManager::new(self.clock.clone(), window, retry.clone());

        Escalator {
            classifier: self.classifier,
            counter: Arc::new(FailureCounter::new(self.config.escalation.failure_limit)),
            history: EscalationHistory::new(self.config.escalation.history_limit),
            settings: ArcSwap::from_pointee(self.config.escalation.clone()),
            requester_id: self.config.approval.requester_id.clone(),
            channel: self.channel,
            threads: self.threads,
            clock: self.clock,
            approvals,
            retry,
        }
    }
}

/// Composes classifier, counter, approvals and retries per failure event.
pub struct Escalator {
    classifier: Arc<ErrorClassifier>,
    retry: RetryHandler,
    counter: Arc<FailureCounter>,
    approvals: ApprovalManager,
    channel: Arc<dyn NotificationChannel>,
    threads: Arc<dyn ThreadProvider>,
    history: EscalationHistory,
    clock: Arc<dyn Clock>,
    settings: ArcSwap<EscalationConfig>,
    requester_id: String,
}

impl Escalator {
    pub fn builder(channel: Arc<dyn NotificationChannel>, threads: Arc<dyn ThreadProvider>) -> EscalatorBuilder {
        EscalatorBuilder {
            channel,
            threads,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            classifier: Arc::new(ErrorClassifier::new()),
            config: GateConfig::default(),
        }
    }

    /// Default configuration, system clock, tokio timer.
    pub fn with_defaults(channel: Arc<dyn NotificationChannel>, threads: Arc<dyn ThreadProvider>) -> Self {
        Self::builder(channel, threads).build()
    }

    pub fn approvals(&self) -> &ApprovalManager {
        &self.approvals
    }

    pub fn counter(&self) -> &FailureCounter {
        &self.counter
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn history(&self) -> &EscalationHistory {
        &self.history
    }

    pub fn retry_handler(&self) -> &RetryHandler {
        &self.retry
    }

    /// Handle one failure event. Never fails.
    pub async fn on_failure(&self, subject: &str, failure_description: &str) -> FailureOutcome {
        let signature = FailureSignature::from_description(failure_description);
        let classification = self.classifier.classify(failure_description);
        let tally = self.counter.record(subject, &signature);

        tracing::info!(
            subject,
            signature = %signature,
            category = %classification.category,
            failure_count = tally.count,
            "Failure event received"
        );

        let outcome = if tally.tripped {
            self.escalate(subject, failure_description, tally.count, &classification)
                .await
        } else {
            self.request_approval(subject, failure_description, tally.count, &classification)
                .await
        };

        self.history.record(HistoryEntry {
            subject: subject.to_string(),
            signature,
            outcome: outcome.kind(),
            failure_count: outcome.failure_count(),
            at: self.clock.now(),
        });
        metrics::record_failure_event(outcome.kind().as_str());
        outcome
    }

    /// Handle a failure event on a background task.
    pub fn spawn_failure(self: &Arc<Self>, subject: String, failure_description: String) -> JoinHandle<FailureOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.on_failure(&subject, &failure_description).await })
    }

    /// Reset every failure count of a subject.
    pub async fn on_success(&self, subject: &str) {
        self.counter.reset(subject, None);
        metrics::record_success_event();
        tracing::debug!(subject, "Success event received, failure counters reset");
    }

    /// Record a human decision and post it to the request's thread.
    pub async fn respond(
        &self,
        id: &RequestId,
        approved: bool,
        comment: Option<String>,
    ) -> GateResult<ApprovalResponse> {
        let response = self.approvals.process_response(id, approved, comment)?;
        if let Some(request) = self.approvals.get_request(id) {
            self.deliver("post_decision", &Notification::decision_recorded(&request))
                .await;
        }
        Ok(response)
    }

    /// Expire overdue requests and post an expiry notice for each.
    pub async fn sweep_expired(&self) -> Vec<RequestId> {
        let expired = self.approvals.process_timeouts();
        for id in &expired {
            if let Some(request) = self.approvals.get_request(id) {
                self.deliver("post_expiry", &Notification::request_expired(&request))
                    .await;
            }
        }
        expired
    }

    /// Apply a reloaded configuration to the running components.
    pub fn apply_config(&self, config: &GateConfig) {
        self.retry.update_options(RetryOptions::from(&config.retries));
        self.counter.set_limit(config.escalation.failure_limit);
        self.settings.store(Arc::new(config.escalation.clone()));
        tracing::info!(
            failure_limit = config.escalation.failure_limit,
            max_attempts = config.retries.max_attempts,
            "Escalation settings reloaded"
        );
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            approvals: self.approvals.summary(),
            failure_limit: self.counter.limit(),
            failures: self.counter.snapshot(),
            classifier: self.classifier.stats(),
            history: self.history.stats(self.clock.now()),
        }
    }

    async fn escalate(
        &self,
        subject: &str,
        failure_description: &str,
        failure_count: u32,
        classification: &Classification,
    ) -> FailureOutcome {
        let settings = self.settings.load_full();
        tracing::warn!(subject, failure_count, "Failure limit reached, escalating to human review");

        // Close the subject's counters before any await; failures recorded
        // while the notice is in flight count toward the next round.
        self.counter.reset(subject, None);
        metrics::record_escalation();

        let expired_requests: Vec<RequestId> = match settings.pending_on_escalation {
            PendingPolicy::Keep => Vec::new(),
            PendingPolicy::Expire => self
                .approvals
                .pending_for_subject(subject)
                .into_iter()
                .filter(|id| self.approvals.force_expire(id).is_ok())
                .collect(),
        };

        let note = Notification::human_judgment_required(
            subject,
            failure_description,
            failure_count,
            classification,
            ESCALATION_RECOMMENDATIONS,
        );
        let notified = self.deliver("post_escalation", &note).await;

        for id in &expired_requests {
            if let Some(request) = self.approvals.get_request(id) {
                self.deliver("post_expiry", &Notification::request_expired(&request))
                    .await;
            }
        }

        FailureOutcome::Escalated {
            failure_count,
            notified,
            expired_requests,
        }
    }

    async fn request_approval(
        &self,
        subject: &str,
        failure_description: &str,
        failure_count: u32,
        classification: &Classification,
    ) -> FailureOutcome {
        let input = NewApprovalRequest::new(
            subject,
            failure_description,
            suggestions_for(classification, failure_description),
            self.requester_id.clone(),
        );
        let request = match self.approvals.create_request(input) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(subject, error = %e, "Could not create approval request");
                return self
                    .fallback(subject, failure_description, failure_count, e.to_string())
                    .await;
            }
        };

        let threads = &self.threads;
        let announced = {
            let request = &request;
            self.retry
                .retry("create_thread", move || threads.create_thread(request))
                .await
        };

        match announced {
            Ok(refs) => {
                if let Err(e) = self
                    .approvals
                    .update_thread_info(&request.id, &refs.thread_ref, &refs.message_ref)
                    .await
                {
                    tracing::warn!(request_id = %request.id, error = %e, "Could not attach thread refs");
                }
                FailureOutcome::ApprovalRequested {
                    request_id: request.id,
                    failure_count,
                }
            }
            Err(err) => {
                let err = GateError::infrastructure(&err, &self.classifier);
                tracing::error!(
                    request_id = %request.id,
                    subject,
                    error = %err,
                    "Approval thread could not be created, falling back to a failure report"
                );
                self.approvals.delete_request(&request.id);
                self.fallback(subject, failure_description, failure_count, err.to_string())
                    .await
            }
        }
    }

    async fn fallback(
        &self,
        subject: &str,
        failure_description: &str,
        failure_count: u32,
        reason: String,
    ) -> FailureOutcome {
        let note = Notification::failure_report(subject, failure_description, failure_count);
        if self.deliver("post_failure_report", &note).await {
            FailureOutcome::FallbackReported { failure_count, reason }
        } else {
            tracing::error!(subject, reason = %reason, "Failure could not be reported");
            FailureOutcome::Unreported { failure_count, reason }
        }
    }

    /// Send under the retry policy. Returns whether delivery succeeded.
    async fn deliver(&self, operation: &str, note: &Notification) -> bool {
        let destination = match &note.thread_ref {
            Some(thread) => thread.clone(),
            None => self.settings.load().destination.clone(),
        };
        let channel = &self.channel;
        let destination = destination.as_str();
        match self
            .retry
            .retry(operation, move || channel.send(destination, note))
            .await
        {
            Ok(ack) => {
                tracing::debug!(operation, message_ref = %ack.message_ref, "Notification delivered");
                true
            }
            Err(e) => {
                tracing::error!(operation, error = %e, "Notification delivery failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::types::ApprovalStatus;
    use crate::clock::ManualClock;
    use crate::notify::LogChannel;
    use crate::resilience::retries::RecordingSleeper;

    fn escalator(config: GateConfig) -> Escalator {
        let sink = Arc::new(LogChannel::new());
        Escalator::builder(sink.clone(), sink)
            .clock(Arc::new(ManualClock::starting_now()))
            .sleeper(Arc::new(RecordingSleeper::new()))
            .config(config)
            .build()
    }

    #[tokio::test]
    async fn test_failure_creates_pending_request_with_thread() {
        let gate = escalator(GateConfig::default());
        let outcome = gate.on_failure("loginTest", "button not found").await;

        let FailureOutcome::ApprovalRequested { request_id, failure_count } = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(failure_count, 1);
        let request = gate.approvals().get_request(&request_id).unwrap();
        assert_eq!(request.status, ApprovalStatus::Pending);
        assert!(request.thread_ref.is_some());
        assert_eq!(request.requester_id, "remediation-gate");
        assert!(!request.remediation_suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_success_resets_counts() {
        let gate = escalator(GateConfig::default());
        gate.on_failure("checkout", "HTTP 500").await;
        gate.on_failure("checkout", "HTTP 500").await;
        assert_eq!(gate.counter().subject_total("checkout"), 2);

        gate.on_success("checkout").await;
        assert_eq!(gate.counter().subject_total("checkout"), 0);
    }

    #[tokio::test]
    async fn test_expire_policy_closes_pending_requests() {
        let mut config = GateConfig::default();
        config.escalation.failure_limit = 2;
        config.escalation.pending_on_escalation = PendingPolicy::Expire;
        let gate = escalator(config);

        let first = gate.on_failure("cart", "boom").await;
        let FailureOutcome::ApprovalRequested { request_id, .. } = first else {
            panic!("unexpected outcome {:?}", first);
        };

        let second = gate.on_failure("cart", "boom").await;
        match second {
            FailureOutcome::Escalated { failure_count, notified, expired_requests } => {
                assert_eq!(failure_count, 2);
                assert!(notified);
                assert_eq!(expired_requests, vec![request_id]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(
            gate.approvals().get_request(&request_id).unwrap().status,
            ApprovalStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_keep_policy_leaves_pending_requests() {
        let mut config = GateConfig::default();
        config.escalation.failure_limit = 2;
        let gate = escalator(config);

        gate.on_failure("cart", "boom").await;
        let outcome = gate.on_failure("cart", "boom").await;
        assert!(matches!(outcome, FailureOutcome::Escalated { ref expired_requests, .. } if expired_requests.is_empty()));
        assert_eq!(gate.approvals().summary().pending, 1);
    }

    #[tokio::test]
    async fn test_apply_config_updates_limit_and_retries() {
        let gate = escalator(GateConfig::default());
        let mut config = GateConfig::default();
        config.escalation.failure_limit = 3;
        config.retries.max_attempts = 1;
        gate.apply_config(&config);

        assert_eq!(gate.counter().limit(), 3);
        assert_eq!(gate.retry_handler().options().max_attempts, 1);
    }

    #[tokio::test]
    async fn test_stats_report() {
        let gate = escalator(GateConfig::default());
        gate.on_failure("a", "HTTP 503").await;
        let stats = gate.stats();
        assert_eq!(stats.approvals.pending, 1);
        assert_eq!(stats.failure_limit, 10);
        assert_eq!(stats.failures.len(), 1);
        assert_eq!(stats.history.approvals_requested, 1);
        assert!(stats.classifier.total >= 1);
    }
}
