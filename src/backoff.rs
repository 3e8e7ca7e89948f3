use std::time::Duration;
use tokio::time::Instant;

/// Consecutive-failure backoff for the queue worker.
///
/// The multiplier starts at 1, becomes `min(cap, 2^errors)` after each
/// failure and snaps back to 1 on the next success. Both the pacing interval
/// and the rate-limit retry delay are scaled by it.
#[derive(Debug, Clone)]
pub struct Backoff {
    consecutive_errors: u32,
    multiplier: u32,
    cap: u32,
    last_call: Option<Instant>,
}

impl Backoff {
    /// Create a backoff at baseline (cap values below 1 are clamped to 1)
    pub fn new(cap: u32) -> Self {
        Self {
            consecutive_errors: 0,
            multiplier: 1,
            cap: cap.max(1),
            last_call: None,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Record a failed call (rate limited or otherwise)
    pub fn record_failure(&mut self) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.multiplier = 2u32.saturating_pow(self.consecutive_errors).min(self.cap);
    }

    /// Record a successful call and return to baseline
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.multiplier = 1;
    }

    /// Remember when the last outbound call was issued
    pub fn mark_call(&mut self, at: Instant) {
        self.last_call = Some(at);
    }

    /// `base` scaled by the current multiplier
    pub fn scaled(&self, base: Duration) -> Duration {
        base.saturating_mul(self.multiplier)
    }

    /// How long to wait at `now` before the next call may go out
    pub fn pacing_delay(&self, min_interval: Duration, now: Instant) -> Duration {
        match self.last_call {
            Some(last) => self
                .scaled(min_interval)
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}
