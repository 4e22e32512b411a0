use std::fmt;
use std::time::Duration;

use crate::retry::AcceptAll;

/// Configures the retry layer.
///
/// `C` decides whether a *successful* response is good enough to stop
/// retrying; see [`crate::Challenge`]. The default accepts every success.
#[derive(Clone)]
pub struct RetryConfig<C = AcceptAll> {
    /// Total attempts including the first one; `1` disables retrying.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay_between_retries: Duration,
    /// Success predicate.
    pub challenge: C,
}

impl RetryConfig {
    /// Retries every error up to `max_attempts` total attempts.
    pub fn new(max_attempts: u32, delay_between_retries: Duration) -> Self {
        Self {
            max_attempts,
            delay_between_retries,
            challenge: AcceptAll,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

impl<C> RetryConfig<C> {
    /// Replaces the success predicate.
    ///
    /// Returning `false` from `challenge` makes the layer retry a response
    /// that the inner service reported as a success.
    pub fn with_challenge<C2>(self, challenge: C2) -> RetryConfig<C2> {
        RetryConfig {
            max_attempts: self.max_attempts,
            delay_between_retries: self.delay_between_retries,
            challenge,
        }
    }

    /// Sets the total number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the pause between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_between_retries = delay;
        self
    }
}

impl<C> fmt::Debug for RetryConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("delay_between_retries", &self.delay_between_retries)
            .field("challenge", &std::any::type_name::<C>())
            .finish()
    }
}

/// Configures the token-bucket rate limiter.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    /// Refill rate.
    pub tokens_per_second: f64,
    /// Bucket capacity, also the initial fill; must be at least one token.
    pub max_tokens: f64,
    /// Wait for a token instead of rejecting immediately.
    pub wait_for_token: bool,
    /// Upper bound on a single call's wait; zero waits indefinitely.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tokens_per_second: 5.0,
            max_tokens: 10.0,
            wait_for_token: true,
            max_wait: Duration::ZERO,
        }
    }
}

impl RateLimitConfig {
    /// Blocking limiter with the given rate and capacity and an unbounded wait.
    pub fn new(tokens_per_second: f64, max_tokens: f64) -> Self {
        Self {
            tokens_per_second,
            max_tokens,
            ..Self::default()
        }
    }

    /// Chooses between waiting for a token and rejecting immediately.
    pub fn with_wait_for_token(mut self, wait_for_token: bool) -> Self {
        self.wait_for_token = wait_for_token;
        self
    }

    /// Bounds the wait for a token; zero means no bound.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{RateLimitConfig, RetryConfig};

    #[test]
    fn defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.delay_between_retries, Duration::from_millis(100));

        let limit = RateLimitConfig::default();
        assert_eq!(limit.tokens_per_second, 5.0);
        assert_eq!(limit.max_tokens, 10.0);
        assert!(limit.wait_for_token);
        assert!(limit.max_wait.is_zero());
    }

    #[test]
    fn with_challenge_keeps_timing() {
        let config = RetryConfig::new(4, Duration::from_secs(1))
            .with_challenge(|status: &u16| *status == 200);
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.delay_between_retries, Duration::from_secs(1));
        assert!((config.challenge)(&200));
    }
}
