//! Exponential backoff policies.
//!
//! `delay(k) = min(base * multiplier^k, max)` for the k-th retry (k = 0 is
//! the wait before the second invocation). The jittered policy spreads each
//! delay by a random factor and clamps the result to the same ceiling.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential delay curve with a cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            base_delay,
            multiplier,
            max_delay,
        }
    }

    /// Delay before retry `k`.
    pub fn delay(&self, k: u32) -> Duration {
        let exponent = i32::try_from(k).unwrap_or(i32::MAX);
        let raw_ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms.max(0.0).round() as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 2.0, Duration::from_millis(30_000))
    }
}

/// Configured policy flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Jittered,
}

/// Named backoff policies a caller can choose between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffPolicy {
    /// Deterministic exponential growth.
    FixedExponential(ExponentialBackoff),
    /// Exponential growth with a ±`spread` random factor.
    JitteredExponential { curve: ExponentialBackoff, spread: f64 },
}

impl BackoffPolicy {
    pub const DEFAULT_SPREAD: f64 = 0.3;

    pub fn fixed(curve: ExponentialBackoff) -> Self {
        BackoffPolicy::FixedExponential(curve)
    }

    pub fn jittered(curve: ExponentialBackoff, spread: f64) -> Self {
        BackoffPolicy::JitteredExponential {
            curve,
            spread: spread.clamp(0.0, 0.99),
        }
    }

    pub fn curve(&self) -> &ExponentialBackoff {
        match self {
            BackoffPolicy::FixedExponential(curve) => curve,
            BackoffPolicy::JitteredExponential { curve, .. } => curve,
        }
    }

    /// Delay before retry `k`.
    pub fn delay(&self, k: u32) -> Duration {
        match self {
            BackoffPolicy::FixedExponential(curve) => curve.delay(k),
            BackoffPolicy::JitteredExponential { curve, spread } => {
                let nominal = curve.delay(k).as_millis() as f64;
                let factor = if *spread > 0.0 {
                    1.0 + rand::thread_rng().gen_range(-*spread..=*spread)
                } else {
                    1.0
                };
                let ceiling = curve.max_delay.as_millis() as f64;
                Duration::from_millis((nominal * factor).clamp(0.0, ceiling).round() as u64)
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::FixedExponential(ExponentialBackoff::default())
    }
}
