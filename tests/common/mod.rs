//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use remediation_gate::approval::ApprovalRequest;
use remediation_gate::clock::ManualClock;
use remediation_gate::config::GateConfig;
use remediation_gate::escalation::Escalator;
use remediation_gate::notify::{
    DeliveryAck, Notification, NotificationChannel, NotificationKind, NotifyError, ThreadProvider, ThreadRefs,
};
use remediation_gate::resilience::retries::RecordingSleeper;

/// Records every delivered notification; fails while `failures_left` > 0.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, Notification)>>,
    failures_left: AtomicU32,
    escalation_delay: Option<Duration>,
    escalation_started: AtomicBool,
    pub calls: AtomicU32,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(times: u32) -> Arc<Self> {
        let channel = Self::default();
        channel.failures_left.store(times, Ordering::SeqCst);
        Arc::new(channel)
    }

    /// Holds every escalation notice for `delay` before accepting it.
    pub fn slow_escalations(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            escalation_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn escalation_started(&self) -> bool {
        self.escalation_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, destination: &str, content: &Notification) -> Result<DeliveryAck, NotifyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if content.kind == NotificationKind::HumanJudgmentRequired {
            self.escalation_started.store(true, Ordering::SeqCst);
            if let Some(delay) = self.escalation_delay {
                tokio::time::sleep(delay).await;
            }
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NotifyError::Status {
                status: 503,
                message: "Service Unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push((destination.to_string(), content.clone()));
        Ok(DeliveryAck {
            message_ref: format!("msg-{}", call),
        })
    }
}

/// Plays back scripted results, then succeeds.
#[derive(Default)]
pub struct ScriptedThreads {
    script: Mutex<VecDeque<NotifyError>>,
    always_fail: Option<NotifyError>,
    pub calls: AtomicU32,
}

impl ScriptedThreads {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_first(errors: Vec<NotifyError>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(errors.into()),
            ..Self::default()
        })
    }

    pub fn always(error: NotifyError) -> Arc<Self> {
        Arc::new(Self {
            always_fail: Some(error),
            ..Self::default()
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThreadProvider for ScriptedThreads {
    async fn create_thread(&self, request: &ApprovalRequest) -> Result<ThreadRefs, NotifyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = &self.always_fail {
            return Err(err.clone());
        }
        if let Some(err) = self.script.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(ThreadRefs {
            thread_ref: format!("thread-{}", request.id),
            message_ref: format!("root-{}", call),
        })
    }
}

pub struct Harness {
    pub escalator: Arc<Escalator>,
    pub clock: Arc<ManualClock>,
    pub sleeper: Arc<RecordingSleeper>,
}

pub fn harness(config: GateConfig, channel: Arc<RecordingChannel>, threads: Arc<ScriptedThreads>) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let sleeper = Arc::new(RecordingSleeper::new());
    let escalator = Escalator::builder(channel, threads)
        .clock(clock.clone())
        .sleeper(sleeper.clone())
        .config(config)
        .build();
    Harness {
        escalator: Arc::new(escalator),
        clock,
        sleeper,
    }
}
