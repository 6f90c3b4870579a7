//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::approval::manager::DEFAULT_APPROVAL_WINDOW_SECS;
use crate::escalation::history::DEFAULT_HISTORY_LIMIT;
use crate::failures::counter::DEFAULT_FAILURE_LIMIT;
use crate::resilience::backoff::{BackoffKind, BackoffPolicy};

/// Root configuration for the remediation gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Approval request lifetime and expiry sweeping.
    pub approval: ApprovalConfig,

    /// Retry policy for collaborator calls.
    pub retries: RetryConfig,

    /// Failure limit and escalation behaviour.
    pub escalation: EscalationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Approval request settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Seconds a request stays pending before it expires.
    pub window_secs: u64,

    /// How often overdue requests are swept.
    pub sweep_interval_secs: u64,

    /// Recorded as the requester of every request the gate creates.
    pub requester_id: String,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_APPROVAL_WINDOW_SECS as u64,
            sweep_interval_secs: 30,
            requester_id: "remediation-gate".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    pub backoff_multiplier: f64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    pub policy: BackoffKind,

    /// Spread of the jittered policy, as a fraction of the delay.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            policy: BackoffKind::Fixed,
            jitter_ratio: BackoffPolicy::DEFAULT_SPREAD,
        }
    }
}

/// What happens to a subject's pending requests when it escalates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingPolicy {
    /// Leave them to their own expiry.
    #[default]
    Keep,
    /// Expire them immediately.
    Expire,
}

/// Escalation settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EscalationConfig {
    /// Failures of one signature before a human is asked to take over.
    pub failure_limit: u32,

    pub pending_on_escalation: PendingPolicy,

    /// Channel receiving escalations and fallback reports.
    pub destination: String,

    /// Outcomes kept for the stats report.
    pub history_limit: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            failure_limit: DEFAULT_FAILURE_LIMIT,
            pending_on_escalation: PendingPolicy::Keep,
            destination: "test-failures".to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // Placeholder; set a real key before enabling.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
