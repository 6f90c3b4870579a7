//! Human responses, expiry and notification of decisions.

use chrono::Duration;

use remediation_gate::approval::{ApprovalStatus, RequestFilter, RequestId};
use remediation_gate::config::GateConfig;
use remediation_gate::error::GateError;
use remediation_gate::escalation::FailureOutcome;
use remediation_gate::notify::NotificationKind;

mod common;
use common::{harness, Harness, RecordingChannel, ScriptedThreads};

async fn open_request(h: &Harness, subject: &str) -> RequestId {
    match h.escalator.on_failure(subject, "HTTP 500 on /api").await {
        FailureOutcome::ApprovalRequested { request_id, .. } => request_id,
        other => panic!("expected approval request, got {:?}", other),
    }
}

#[tokio::test]
async fn test_approval_is_recorded_and_posted_to_thread() {
    let channel = RecordingChannel::new();
    let h = harness(GateConfig::default(), channel.clone(), ScriptedThreads::ok());
    let id = open_request(&h, "checkout").await;

    let response = h
        .escalator
        .respond(&id, true, Some("ship the selector fix".into()))
        .await
        .unwrap();
    assert!(response.approved);
    assert!(response.success);

    let request = h.escalator.approvals().get_request(&id).unwrap();
    assert_eq!(request.status, ApprovalStatus::Approved);
    assert_eq!(request.response_comment.as_deref(), Some("ship the selector fix"));
    assert!(request.responded_at.is_some());

    let sent = channel.sent();
    let (destination, note) = sent.last().unwrap();
    assert_eq!(note.kind, NotificationKind::DecisionRecorded);
    assert_eq!(destination, &format!("thread-{}", id));
    assert!(note.body.contains("approved"));
}

#[tokio::test]
async fn test_second_response_is_refused() {
    let h = harness(GateConfig::default(), RecordingChannel::new(), ScriptedThreads::ok());
    let id = open_request(&h, "checkout").await;

    h.escalator.respond(&id, false, None).await.unwrap();
    let err = h.escalator.respond(&id, true, None).await.unwrap_err();
    assert_eq!(
        err,
        GateError::AlreadyProcessed {
            id,
            status: ApprovalStatus::Rejected
        }
    );
}

#[tokio::test]
async fn test_unknown_request() {
    let h = harness(GateConfig::default(), RecordingChannel::new(), ScriptedThreads::ok());
    let id = RequestId::new();
    let err = h.escalator.respond(&id, true, None).await.unwrap_err();
    assert_eq!(err, GateError::NotFound(id));
}

#[tokio::test]
async fn test_late_response_expires_request() {
    let h = harness(GateConfig::default(), RecordingChannel::new(), ScriptedThreads::ok());
    let id = open_request(&h, "checkout").await;

    h.clock.advance(Duration::hours(24));
    let err = h.escalator.respond(&id, true, None).await.unwrap_err();
    assert_eq!(
        err,
        GateError::AlreadyProcessed {
            id,
            status: ApprovalStatus::Expired
        }
    );
    assert_eq!(h.escalator.approvals().get_request(&id).unwrap().status, ApprovalStatus::Expired);
    assert!(h.escalator.sweep_expired().await.is_empty());
}

#[tokio::test]
async fn test_sweep_expires_overdue_and_notifies() {
    let channel = RecordingChannel::new();
    let h = harness(GateConfig::default(), channel.clone(), ScriptedThreads::ok());
    let stale = open_request(&h, "search").await;

    h.clock.advance(Duration::hours(12));
    let fresh = open_request(&h, "search").await;

    h.clock.advance(Duration::hours(13));
    let expired = h.escalator.sweep_expired().await;
    assert_eq!(expired, vec![stale]);
    assert_eq!(h.escalator.approvals().get_request(&fresh).unwrap().status, ApprovalStatus::Pending);

    let notices: Vec<_> = channel
        .sent()
        .into_iter()
        .filter(|(_, n)| n.kind == NotificationKind::RequestExpired)
        .collect();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].1.request_id, Some(stale));

    assert!(h.escalator.sweep_expired().await.is_empty());
}

#[tokio::test]
async fn test_answered_request_is_not_swept() {
    let h = harness(GateConfig::default(), RecordingChannel::new(), ScriptedThreads::ok());
    let id = open_request(&h, "search").await;
    h.escalator.respond(&id, true, None).await.unwrap();

    h.clock.advance(Duration::days(2));
    assert!(h.escalator.sweep_expired().await.is_empty());
    assert_eq!(h.escalator.approvals().get_request(&id).unwrap().status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn test_filters_and_summary() {
    let h = harness(GateConfig::default(), RecordingChannel::new(), ScriptedThreads::ok());
    let a = open_request(&h, "alpha").await;
    let _b = open_request(&h, "beta").await;
    let _c = open_request(&h, "beta").await;
    h.escalator.respond(&a, false, None).await.unwrap();

    let approvals = h.escalator.approvals();
    let pending = approvals.get_all_requests(&RequestFilter::with_status(ApprovalStatus::Pending));
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|r| r.subject_name == "beta"));

    let by_requester = approvals.get_all_requests(&RequestFilter {
        requester_id: Some("remediation-gate".into()),
        ..RequestFilter::default()
    });
    assert_eq!(by_requester.len(), 3);

    let summary = approvals.summary();
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.total(), 3);
}
