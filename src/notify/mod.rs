//! Collaborator interfaces for outbound notifications.
//!
//! # Data Flow
//! ```text
//! escalation orchestrator
//!     → ThreadProvider::create_thread (once per approval request)
//!     → NotificationChannel::send (escalations, fallbacks, decisions, expiries)
//! ```
//!
//! The chat transport itself lives outside this crate. [`LogChannel`] is the
//! sink the daemon uses when no transport is wired in; it writes every
//! notification to the log.

pub mod message;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::approval::types::ApprovalRequest;

pub use message::{Notification, NotificationKind};

/// Collaborator failure. Display text carries the markers the classifier and
/// retry lists look for (status codes, "timed out", "transport error").
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request timed out after {0}ms")]
    Timeout(u64),
}

/// Delivery acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAck {
    pub message_ref: String,
}

/// References to a created discussion thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRefs {
    pub thread_ref: String,
    pub message_ref: String,
}

/// Sends notifications to a destination (channel, room, webhook).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, destination: &str, content: &Notification) -> Result<DeliveryAck, NotifyError>;
}

/// Opens a discussion thread for an approval request.
#[async_trait]
pub trait ThreadProvider: Send + Sync {
    async fn create_thread(&self, request: &ApprovalRequest) -> Result<ThreadRefs, NotifyError>;
}

/// Logs notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct LogChannel {
    sequence: AtomicU64,
}

impl LogChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_ref(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.sequence.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, destination: &str, content: &Notification) -> Result<DeliveryAck, NotifyError> {
        tracing::info!(
            destination,
            kind = ?content.kind,
            subject = %content.subject,
            "{}\n{}",
            content.title,
            content.body
        );
        Ok(DeliveryAck {
            message_ref: self.next_ref("log-message"),
        })
    }
}

#[async_trait]
impl ThreadProvider for LogChannel {
    async fn create_thread(&self, request: &ApprovalRequest) -> Result<ThreadRefs, NotifyError> {
        let thread_ref = self.next_ref("log-thread");
        tracing::info!(
            request_id = %request.id,
            subject = %request.subject_name,
            thread_ref = %thread_ref,
            "Approval thread opened"
        );
        Ok(ThreadRefs {
            message_ref: self.next_ref("log-message"),
            thread_ref,
        })
    }
}
