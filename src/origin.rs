use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{BoxFuture, Error, HttpRequest, Layer, Result, Service};

/// Zero-argument asynchronous origin provider.
pub type OriginProvider = Arc<dyn Fn() -> BoxFuture<String> + Send + Sync>;

const ABSOLUTE_PREFIXES: [&str; 2] = ["http://", "https://"];

/// Joins `origin` and a relative `path` with exactly one slash.
///
/// Trailing slashes are trimmed from the origin and leading slashes from
/// the path. An empty path yields the trimmed origin.
///
/// ```
/// use layerkit::combine_url;
///
/// assert_eq!(combine_url("https://example.com/", "/a/b"), "https://example.com/a/b");
/// assert_eq!(combine_url("https://example.com", ""), "https://example.com");
/// ```
pub fn combine_url(origin: &str, path: &str) -> String {
    let origin = origin.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        origin.to_owned()
    } else {
        format!("{origin}/{path}")
    }
}

fn is_absolute(url: &str) -> bool {
    ABSOLUTE_PREFIXES.iter().any(|prefix| {
        url.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

#[derive(Clone)]
enum OriginSource {
    Static(String),
    Provider(OriginProvider),
}

/// Resolves relative request URLs against an origin.
///
/// Absolute `http://` and `https://` URLs pass through untouched. For an
/// async provider, the first non-empty origin is cached per wrapped service;
/// an empty result is not cached and fails the call with
/// [`Error::InvalidTarget`] before the inner service is reached.
#[derive(Clone)]
pub struct OriginLayer {
    source: OriginSource,
}

impl OriginLayer {
    /// Uses a fixed origin such as `https://api.example.com`.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            source: OriginSource::Static(origin.into()),
        }
    }

    /// Resolves the origin by awaiting `provider`.
    pub fn from_provider<F, Fut>(provider: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let provider: OriginProvider =
            Arc::new(move || -> BoxFuture<String> { Box::pin(provider()) });
        Self {
            source: OriginSource::Provider(provider),
        }
    }

    /// Reads a fixed origin from the environment variable `var`.
    ///
    /// Returns an error if the variable is missing or empty.
    ///
    /// ```no_run
    /// use layerkit::OriginLayer;
    ///
    /// let origin = OriginLayer::from_env("API_ORIGIN").expect("missing API_ORIGIN");
    /// ```
    pub fn from_env(var: &str) -> std::result::Result<Self, String> {
        let origin =
            std::env::var(var).map_err(|_| format!("missing {var} environment variable"))?;
        if origin.trim().is_empty() {
            return Err(format!("{var} is set but empty"));
        }
        Ok(Self::new(origin.trim()))
    }
}

impl fmt::Debug for OriginLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("OriginLayer");
        match &self.source {
            OriginSource::Static(origin) => debug.field("origin", origin),
            OriginSource::Provider(_) => debug.field("origin", &"<provider>"),
        };
        debug.finish()
    }
}

impl<S> Layer<S> for OriginLayer
where
    S: Service<HttpRequest>,
{
    type Service = OriginService<S>;

    fn wrap(&self, inner: S) -> Self::Service {
        OriginService {
            inner,
            source: self.source.clone(),
            cached: Mutex::new(None),
        }
    }
}

/// Service produced by [`OriginLayer`].
pub struct OriginService<S> {
    inner: S,
    source: OriginSource,
    cached: Mutex<Option<String>>,
}

impl<S> OriginService<S> {
    /// The cached provider origin, if one has been resolved.
    pub fn cached_origin(&self) -> Option<String> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn resolve(&self) -> String {
        let provider = match &self.source {
            OriginSource::Static(origin) => return origin.clone(),
            OriginSource::Provider(provider) => provider,
        };

        if let Some(origin) = self.cached_origin() {
            return origin;
        }

        let origin = provider().await;
        if !origin.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!("origin resolved to {origin}");
            let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
            // Concurrent resolutions race; the first value stored is kept.
            return cached.get_or_insert(origin).clone();
        }
        origin
    }
}

impl<S> fmt::Debug for OriginService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginService")
            .field("cached", &self.cached_origin())
            .finish_non_exhaustive()
    }
}

impl<S> Service<HttpRequest> for OriginService<S>
where
    S: Service<HttpRequest>,
{
    type Response = S::Response;

    async fn call(&self, request: &HttpRequest) -> Result<S::Response> {
        if is_absolute(&request.url) {
            return self.inner.call(request).await;
        }

        let origin = self.resolve().await;
        if origin.is_empty() {
            return Err(Error::InvalidTarget(format!(
                "no origin available to resolve {:?}",
                request.url
            )));
        }

        let mut request = request.clone();
        request.url = combine_url(&origin, &request.url);
        #[cfg(feature = "tracing")]
        tracing::debug!("resolved request url {}", request.url);
        self.inner.call(&request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::{combine_url, is_absolute, OriginLayer};
    use crate::{service_fn, Error, ErrorKind, HttpRequest, Layer, Service};

    fn echo_url(hits: Arc<AtomicUsize>) -> impl Service<HttpRequest, Response = String> {
        service_fn(move |request: HttpRequest| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(request.url)
            }
        })
    }

    #[test]
    fn combine_url_joins_with_single_slash() {
        assert_eq!(combine_url("https://example.com", "/a/b"), "https://example.com/a/b");
        assert_eq!(combine_url("https://example.com/", "a/b"), "https://example.com/a/b");
        assert_eq!(combine_url("https://example.com/", "/a/b"), "https://example.com/a/b");
        assert_eq!(combine_url("https://example.com", ""), "https://example.com");
        assert_eq!(combine_url("https://example.com///", "//"), "https://example.com");
    }

    #[test]
    fn absolute_detection_ignores_case() {
        assert!(is_absolute("https://example.com"));
        assert!(is_absolute("HTTP://example.com"));
        assert!(!is_absolute("/users"));
        assert!(!is_absolute("ftp://example.com"));
        assert!(!is_absolute("http"));
    }

    #[tokio::test]
    async fn static_origin_prefixes_relative_urls() {
        let hits = Arc::new(AtomicUsize::new(0));
        let svc = OriginLayer::new("https://api.example.com/").wrap(echo_url(Arc::clone(&hits)));

        let url = svc.call(&HttpRequest::get("/v1/users")).await;
        assert_eq!(url, Ok("https://api.example.com/v1/users".to_owned()));
    }

    #[tokio::test]
    async fn absolute_urls_pass_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = OriginLayer::from_provider({
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { "https://unused.example.com".to_owned() }
            }
        });
        let svc = layer.wrap(echo_url(Arc::new(AtomicUsize::new(0))));

        let url = svc.call(&HttpRequest::get("HTTPS://other.example.com/x")).await;
        assert_eq!(url, Ok("HTTPS://other.example.com/x".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_origin_is_cached_per_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = OriginLayer::from_provider({
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { "https://dynamic.example.com".to_owned() }
            }
        });
        let first = layer.wrap(echo_url(Arc::new(AtomicUsize::new(0))));

        assert_eq!(first.call(&HttpRequest::get("a")).await, Ok("https://dynamic.example.com/a".to_owned()));
        assert_eq!(first.call(&HttpRequest::get("b")).await, Ok("https://dynamic.example.com/b".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.cached_origin().as_deref(), Some("https://dynamic.example.com"));

        let second = layer.wrap(echo_url(Arc::new(AtomicUsize::new(0))));
        assert_eq!(second.cached_origin(), None);
        second.call(&HttpRequest::get("c")).await.expect("origin resolves");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_origin_fails_and_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hits = Arc::new(AtomicUsize::new(0));
        let layer = OriginLayer::from_provider({
            let calls = Arc::clone(&calls);
            move || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        String::new()
                    } else {
                        "https://late.example.com".to_owned()
                    }
                }
            }
        });
        let svc = layer.wrap(echo_url(Arc::clone(&hits)));

        let err = svc.call(&HttpRequest::get("/x")).await.expect_err("origin is empty");
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(svc.cached_origin(), None);

        let url = svc.call(&HttpRequest::get("/x")).await;
        assert_eq!(url, Ok("https://late.example.com/x".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_static_origin_is_invalid_target() {
        let hits = Arc::new(AtomicUsize::new(0));
        let svc = OriginLayer::new("").wrap(echo_url(Arc::clone(&hits)));

        let err = svc.call(&HttpRequest::get("/x")).await.expect_err("origin is empty");
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn from_env_rejects_missing_variable() {
        let err = OriginLayer::from_env("LAYERKIT_TEST_ORIGIN_THAT_IS_NEVER_SET")
            .expect_err("variable is unset");
        assert!(err.contains("LAYERKIT_TEST_ORIGIN_THAT_IS_NEVER_SET"));
    }
}
