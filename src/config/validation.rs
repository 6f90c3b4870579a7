//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, multiplier >= 1, ratios in range)
//! - Reject an enabled admin API without a key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::approval::manager::MAX_APPROVAL_WINDOW_SECS;
use crate::config::schema::GateConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// One violated rule, keyed by the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let approval = &config.approval;
    if approval.window_secs == 0 {
        errors.push(ValidationError::new("approval.window_secs", "must be greater than 0"));
    } else if approval.window_secs > MAX_APPROVAL_WINDOW_SECS {
        errors.push(ValidationError::new(
            "approval.window_secs",
            format!("must not exceed {}", MAX_APPROVAL_WINDOW_SECS),
        ));
    }
    if approval.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("approval.sweep_interval_secs", "must be greater than 0"));
    }
    if approval.requester_id.trim().is_empty() {
        errors.push(ValidationError::new("approval.requester_id", "must not be empty"));
    }

    let retries = &config.retries;
    if !(retries.backoff_multiplier >= 1.0) {
        errors.push(ValidationError::new("retries.backoff_multiplier", "must be at least 1.0"));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            format!("must not exceed max_delay_ms ({})", retries.max_delay_ms),
        ));
    }
    if !(0.0..1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::new("retries.jitter_ratio", "must be in [0, 1)"));
    }

    let escalation = &config.escalation;
    if escalation.failure_limit == 0 {
        errors.push(ValidationError::new("escalation.failure_limit", "must be at least 1"));
    }
    if escalation.destination.trim().is_empty() {
        errors.push(ValidationError::new("escalation.destination", "must not be empty"));
    }
    if escalation.history_limit == 0 {
        errors.push(ValidationError::new("escalation.history_limit", "must be at least 1"));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "required when the admin API is enabled"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
