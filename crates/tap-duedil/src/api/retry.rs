//! Retry policy and HTTP status classification
//!
//! The transport asks `classify_status` what a response means and asks the
//! `RetryPolicy` whether, and how long, to wait before trying again.

use std::time::Duration;

/// Transient failure worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// 429
    RateLimited,
    /// 500, 503, connection failures and timeouts
    UpstreamUnavailable,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::RateLimited => f.write_str("rate limited"),
            Condition::UpstreamUnavailable => f.write_str("upstream unavailable"),
        }
    }
}

/// What a status code means to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 404: nothing exists for this identifier
    NotFound,
    /// 400: logged, surfaced to the caller as "no data"
    BadRequest,
    Transient(Condition),
    Fatal,
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        404 => StatusClass::NotFound,
        400 => StatusClass::BadRequest,
        429 => StatusClass::Transient(Condition::RateLimited),
        // The search endpoint answers 500 on a cold cache; a retry usually succeeds.
        500 | 503 => StatusClass::Transient(Condition::UpstreamUnavailable),
        _ => StatusClass::Fatal,
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Multiplier applied per further attempt
    pub factor: u32,
    /// Ceiling for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_secs(2),
            factor: 2,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Policy that retries immediately, for tests and local mocks
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Whether another attempt may follow failed attempt number `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Wait before the attempt following `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let multiplier = self.factor.saturating_pow(exponent);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
