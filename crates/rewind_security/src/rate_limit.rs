//! Per-caller token bucket.
//!
//! The bucket starts full, refills continuously at `rate` tokens per second
//! up to `burst`, and each request costs one token.

use thiserror::Error;

/// Bad bucket tuning. Raised once, at startup.
#[derive(Error, Clone, Copy, Debug, PartialEq)]
pub enum RateLimitError {
    /// Burst must be positive.
    #[error("rate limit burst must be positive, got {0}")]
    InvalidBurst(f64),

    /// Rate must be non-negative.
    #[error("rate limit refill rate must be non-negative, got {0}")]
    InvalidRate(f64),
}

/// Refill rate and size of a bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateLimit {
    /// Tokens per second.
    pub rate: f64,
    /// Bucket size.
    pub burst: f64,
}

impl RateLimit {
    /// Checked tuning.
    ///
    /// # Errors
    ///
    /// Non-positive burst or negative rate.
    pub fn new(rate: f64, burst: f64) -> Result<Self, RateLimitError> {
        if !(burst.is_finite() && burst > 0.0) {
            return Err(RateLimitError::InvalidBurst(burst));
        }
        if !(rate.is_finite() && rate >= 0.0) {
            return Err(RateLimitError::InvalidRate(rate));
        }
        Ok(Self { rate, burst })
    }
}

/// One caller's bucket.
#[derive(Clone, Debug)]
pub struct TokenBucket {
    limit: RateLimit,
    tokens: f64,
    last_refill: f64,
}

impl TokenBucket {
    /// Full bucket, clock starting at `now`.
    #[must_use]
    pub const fn new(limit: RateLimit, now: f64) -> Self {
        Self { limit, tokens: limit.burst, last_refill: now }
    }

    /// Takes one token if available.
    pub fn try_acquire(&mut self, now: f64) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens left after refilling to `now`.
    pub fn available(&mut self, now: f64) -> f64 {
        self.refill(now);
        self.tokens
    }

    fn refill(&mut self, now: f64) {
        // A clock that steps backwards grants nothing.
        if now > self.last_refill {
            let elapsed = now - self.last_refill;
            self.tokens = (self.tokens + elapsed * self.limit.rate).min(self.limit.burst);
            self.last_refill = now;
        }
    }
}
