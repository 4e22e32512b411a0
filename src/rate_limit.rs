use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::{Error, Layer, RateLimitConfig, Result, Service};

/// Continuous-refill token bucket.
///
/// Tokens accrue at `tokens_per_second` from the wall-clock time elapsed
/// since the last refill, capped at `max_tokens`. The bucket starts full.
/// All state transitions happen under one short-lived lock.
#[derive(Debug)]
pub struct TokenBucket {
    tokens_per_second: f64,
    max_tokens: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    current_tokens: f64,
    last_refill: Instant,
}

enum Acquire {
    Acquired,
    /// Time until one whole token is available.
    Wait(Duration),
}

impl TokenBucket {
    /// Creates a full bucket.
    ///
    /// # Panics
    ///
    /// Panics unless `tokens_per_second` is finite and positive and
    /// `max_tokens` is finite and at least one whole token.
    pub fn new(tokens_per_second: f64, max_tokens: f64) -> Self {
        assert_valid_rates(tokens_per_second, max_tokens);
        Self {
            tokens_per_second,
            max_tokens,
            state: Mutex::new(BucketState {
                current_tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token if available.
    pub fn try_acquire(&self) -> bool {
        matches!(self.acquire_or_wait(), Acquire::Acquired)
    }

    /// Returns the current (refilled) token count.
    pub fn available(&self) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state);
        state.current_tokens
    }

    fn acquire_or_wait(&self) -> Acquire {
        let mut state = self.lock();
        self.refill(&mut state);

        if state.current_tokens >= 1.0 {
            state.current_tokens -= 1.0;
            return Acquire::Acquired;
        }

        let missing = 1.0 - state.current_tokens;
        let wait = Duration::try_from_secs_f64(missing / self.tokens_per_second)
            .unwrap_or(Duration::MAX);
        Acquire::Wait(wait)
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed.is_zero() {
            return;
        }
        let refilled = state.current_tokens + elapsed.as_secs_f64() * self.tokens_per_second;
        state.current_tokens = refilled.min(self.max_tokens);
        state.last_refill = now;
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // The state is always left consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn assert_valid_rates(tokens_per_second: f64, max_tokens: f64) {
    assert!(
        tokens_per_second.is_finite() && tokens_per_second > 0.0,
        "tokens_per_second must be positive"
    );
    assert!(
        max_tokens.is_finite() && max_tokens >= 1.0,
        "max_tokens must be at least 1"
    );
}

/// Admits calls through a token bucket.
///
/// The layer only holds configuration: every [`Layer::wrap`] creates a
/// service with its own, independent bucket.
#[derive(Clone, Debug)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
}

impl RateLimitLayer {
    /// Creates a rate-limit layer.
    ///
    /// # Panics
    ///
    /// Panics unless `config.tokens_per_second` is finite and positive and
    /// `config.max_tokens` is finite and at least 1.
    pub fn new(config: RateLimitConfig) -> Self {
        assert_valid_rates(config.tokens_per_second, config.max_tokens);
        Self { config }
    }

    /// Configuration applied to every wrapped service.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn wrap(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            bucket: TokenBucket::new(self.config.tokens_per_second, self.config.max_tokens),
            wait_for_token: self.config.wait_for_token,
            max_wait: self.config.max_wait,
        }
    }
}

/// Service produced by [`RateLimitLayer`].
#[derive(Debug)]
pub struct RateLimitService<S> {
    inner: S,
    bucket: TokenBucket,
    wait_for_token: bool,
    max_wait: Duration,
}

impl<S> RateLimitService<S> {
    /// The bucket owned by this instance.
    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    async fn acquire(&self) -> Result<()> {
        if !self.wait_for_token {
            if self.bucket.try_acquire() {
                return Ok(());
            }
            #[cfg(feature = "tracing")]
            tracing::debug!("rate limit: no token available, rejecting call");
            return Err(Error::RateLimitExceeded("no token available".to_owned()));
        }

        // A budget too large to represent as an instant is unbounded.
        let deadline = if self.max_wait.is_zero() {
            None
        } else {
            Instant::now().checked_add(self.max_wait)
        };

        loop {
            let wait = match self.bucket.acquire_or_wait() {
                Acquire::Acquired => return Ok(()),
                Acquire::Wait(wait) => wait,
            };

            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(Error::RateLimitTimeout(format!(
                            "no token within {:?}",
                            self.max_wait
                        )));
                    }
                    wait.min(remaining)
                }
                None => wait,
            };

            #[cfg(feature = "tracing")]
            tracing::debug!("rate limit: waiting {:?} for a token", wait);

            sleep(wait).await;
        }
    }
}

impl<S, Request> Service<Request> for RateLimitService<S>
where
    S: Service<Request>,
    Request: Sync,
{
    type Response = S::Response;

    async fn call(&self, request: &Request) -> Result<S::Response> {
        self.acquire().await?;
        self.inner.call(request).await
    }
}
