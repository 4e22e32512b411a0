use std::fmt;

use crate::{Layer, Result, RetryConfig, Service};

/// Decides whether a successful response is acceptable.
///
/// A response that fails its challenge is retried like an error, as long as
/// attempts remain. Any `Fn(&Response) -> bool` closure is a challenge.
pub trait Challenge<Response>: Send + Sync {
    fn accept(&self, response: &Response) -> bool;
}

/// Challenge that accepts every successful response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcceptAll;

impl<Response> Challenge<Response> for AcceptAll {
    fn accept(&self, _response: &Response) -> bool {
        true
    }
}

impl<Response, F> Challenge<Response> for F
where
    F: Fn(&Response) -> bool + Send + Sync,
{
    fn accept(&self, response: &Response) -> bool {
        self(response)
    }
}

/// Re-attempts calls with a fixed delay between attempts.
///
/// A call is retried when it fails, or when it succeeds but the configured
/// challenge rejects the response. Once attempts run out the last outcome is
/// returned as is, whether value or error. No state is shared between
/// separate calls.
#[derive(Clone)]
pub struct RetryLayer<C = AcceptAll> {
    config: RetryConfig<C>,
}

impl<C> RetryLayer<C> {
    /// Creates a retry layer.
    ///
    /// # Panics
    ///
    /// Panics if `config.max_attempts` is zero.
    pub fn new(config: RetryConfig<C>) -> Self {
        assert!(config.max_attempts >= 1, "max_attempts must be at least 1");
        Self { config }
    }

    /// Configuration applied to every wrapped service.
    pub fn config(&self) -> &RetryConfig<C> {
        &self.config
    }
}

impl<C> fmt::Debug for RetryLayer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryLayer")
            .field("config", &self.config)
            .finish()
    }
}

impl<S, C: Clone> Layer<S> for RetryLayer<C> {
    type Service = RetryService<S, C>;

    fn wrap(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Service produced by [`RetryLayer`].
pub struct RetryService<S, C = AcceptAll> {
    inner: S,
    config: RetryConfig<C>,
}

impl<S, C> fmt::Debug for RetryService<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, C, Request> Service<Request> for RetryService<S, C>
where
    S: Service<Request>,
    C: Challenge<S::Response>,
    Request: Sync,
{
    type Response = S::Response;

    async fn call(&self, request: &Request) -> Result<S::Response> {
        let max_attempts = self.config.max_attempts.max(1);
        let delay = self.config.delay_between_retries;
        let mut attempt = 1;

        loop {
            let result = self.inner.call(request).await;

            let accepted = match &result {
                Ok(response) => self.config.challenge.accept(response),
                Err(_) => false,
            };
            if accepted || attempt >= max_attempts {
                return result;
            }

            #[cfg(feature = "tracing")]
            match &result {
                Ok(_) => tracing::warn!(
                    "retrying (attempt {}/{}): response rejected by challenge",
                    attempt + 1,
                    max_attempts
                ),
                Err(err) => tracing::warn!(
                    "retrying (attempt {}/{}) after error: {err}",
                    attempt + 1,
                    max_attempts
                ),
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
