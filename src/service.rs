use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::Result;

/// Owned, sendable future returned by async providers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// An asynchronous unary call: `request -> Result<response>`.
///
/// Every layer and the base transport implement this contract. Calls take
/// `&self`, so a single instance can serve many concurrent in-flight calls;
/// implementations that keep mutable state guard it internally.
///
/// Ordinary failures are reported as [`crate::Error`] values, never panics.
pub trait Service<Request>: Send + Sync {
    /// Value produced by a successful call.
    type Response: Send;

    /// Performs one call.
    ///
    /// The request is borrowed; implementations that need to rewrite it work
    /// on their own copy.
    fn call(&self, request: &Request) -> impl Future<Output = Result<Self::Response>> + Send;
}

impl<S, Request> Service<Request> for Arc<S>
where
    S: Service<Request>,
{
    type Response = S::Response;

    fn call(&self, request: &Request) -> impl Future<Output = Result<Self::Response>> + Send {
        (**self).call(request)
    }
}

/// Service built from an async closure. See [`service_fn`].
#[derive(Clone)]
pub struct ServiceFn<F> {
    f: F,
}

impl<F> fmt::Debug for ServiceFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

/// Wraps an async closure as a [`Service`].
///
/// The closure receives an owned clone of each request. Handy for custom
/// transports and for test doubles at the bottom of a chain.
///
/// ```
/// use layerkit::{service_fn, HttpRequest, HttpResponse, Service};
///
/// # async fn demo() -> layerkit::Result<()> {
/// let echo = service_fn(|req: HttpRequest| async move {
///     Ok::<_, layerkit::Error>(HttpResponse::with_status(200).with_body(req.url.into_bytes()))
/// });
/// let response = echo.call(&HttpRequest::get("https://example.com")).await?;
/// assert!(response.succeeded);
/// # Ok(())
/// # }
/// ```
pub fn service_fn<F>(f: F) -> ServiceFn<F> {
    ServiceFn { f }
}

impl<F, Fut, Request, Response> Service<Request> for ServiceFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
    Request: Clone,
    Response: Send,
{
    type Response = Response;

    fn call(&self, request: &Request) -> impl Future<Output = Result<Self::Response>> + Send {
        (self.f)(request.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{service_fn, Service};
    use crate::Error;

    #[tokio::test]
    async fn service_fn_receives_owned_request() {
        let svc = service_fn(|value: u32| async move { Ok::<_, Error>(value * 2) });
        assert_eq!(svc.call(&21).await, Ok(42));
    }

    #[tokio::test]
    async fn arc_forwards_to_inner_service() {
        let svc = Arc::new(service_fn(|_: ()| async {
            Err::<(), _>(Error::NoResponse("nothing".to_owned()))
        }));
        let shared = Arc::clone(&svc);
        let err = shared.call(&()).await.expect_err("inner fails");
        assert_eq!(err, Error::NoResponse("nothing".to_owned()));
    }
}
