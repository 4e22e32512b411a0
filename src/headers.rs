use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::{BoxFuture, HttpRequest, Layer, Result, Service};

/// Zero-argument header value provider, evaluated per call.
pub type LazyHeaderProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// Zero-argument asynchronous header value provider, awaited per call.
pub type AsyncHeaderProvider = Arc<dyn Fn() -> BoxFuture<String> + Send + Sync>;

/// Headers merged into every request by [`HeaderInjectionLayer`].
///
/// Sources are applied in order: static values, lazy providers, then async
/// providers. Within a source, entries apply in insertion order. Adding a
/// name twice to the same source replaces the earlier entry.
#[derive(Clone, Default)]
pub struct HeaderInjectionConfig {
    static_headers: Vec<(String, String)>,
    lazy_headers: Vec<(String, LazyHeaderProvider)>,
    async_headers: Vec<(String, AsyncHeaderProvider)>,
    override_existing: bool,
}

impl HeaderInjectionConfig {
    /// Creates an empty configuration that does not override existing headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        upsert(&mut self.static_headers, name.into(), value.into());
        self
    }

    /// Adds a header whose value is computed on each call that writes it.
    pub fn with_lazy_header<F>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        upsert(&mut self.lazy_headers, name.into(), Arc::new(provider));
        self
    }

    /// Adds a header whose value is awaited on each call that writes it.
    pub fn with_async_header<F, Fut>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let provider: AsyncHeaderProvider =
            Arc::new(move || -> BoxFuture<String> { Box::pin(provider()) });
        upsert(&mut self.async_headers, name.into(), provider);
        self
    }

    /// When `true`, configured headers replace values already on the request.
    /// Otherwise they are only added when the request lacks that header.
    pub fn override_existing(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }

    fn writes(&self, request: &HttpRequest, name: &str) -> bool {
        self.override_existing || !request.headers.contains(name)
    }
}

impl fmt::Debug for HeaderInjectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderInjectionConfig")
            .field("static_headers", &names_of(&self.static_headers))
            .field("lazy_headers", &names_of(&self.lazy_headers))
            .field("async_headers", &names_of(&self.async_headers))
            .field("override_existing", &self.override_existing)
            .finish()
    }
}

fn names_of<T>(entries: &[(String, T)]) -> Vec<&str> {
    entries.iter().map(|(name, _)| name.as_str()).collect()
}

fn upsert<T>(entries: &mut Vec<(String, T)>, name: String, value: T) {
    match entries
        .iter_mut()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
    {
        Some(entry) => entry.1 = value,
        None => entries.push((name, value)),
    }
}

/// Merges static, lazy and async-resolved headers into outgoing requests.
///
/// Providers run only when their value will actually be written. Async
/// providers are awaited one after another in configuration order, so a
/// provider may rely on side effects of an earlier one.
#[derive(Clone, Debug, Default)]
pub struct HeaderInjectionLayer {
    config: Arc<HeaderInjectionConfig>,
}

impl HeaderInjectionLayer {
    /// Creates a layer from `config`.
    pub fn new(config: HeaderInjectionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Layer injecting a fixed set of headers.
    pub fn from_headers<I, K, V>(headers: I, override_existing: bool) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let config = headers
            .into_iter()
            .fold(HeaderInjectionConfig::new(), |config, (name, value)| {
                config.with_header(name, value)
            })
            .override_existing(override_existing);
        Self::new(config)
    }
}

impl<S> Layer<S> for HeaderInjectionLayer
where
    S: Service<HttpRequest>,
{
    type Service = HeaderInjectionService<S>;

    fn wrap(&self, inner: S) -> Self::Service {
        HeaderInjectionService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Service produced by [`HeaderInjectionLayer`].
pub struct HeaderInjectionService<S> {
    inner: S,
    config: Arc<HeaderInjectionConfig>,
}

impl<S> fmt::Debug for HeaderInjectionService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderInjectionService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S> Service<HttpRequest> for HeaderInjectionService<S>
where
    S: Service<HttpRequest>,
{
    type Response = S::Response;

    async fn call(&self, request: &HttpRequest) -> Result<S::Response> {
        let config = &self.config;
        let mut request = request.clone();

        for (name, value) in &config.static_headers {
            if config.writes(&request, name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }

        for (name, provider) in &config.lazy_headers {
            if config.writes(&request, name) {
                request.headers.insert(name.clone(), provider());
            }
        }

        for (name, provider) in &config.async_headers {
            if config.writes(&request, name) {
                let value = provider().await;
                request.headers.insert(name.clone(), value);
            }
        }

        self.inner.call(&request).await
    }
}
