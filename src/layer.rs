//! Layer contract and the type-checked [`ServiceBuilder`].

use std::sync::Arc;

/// Wraps an inner service `S`, producing a new service around it.
///
/// Layers are immutable configuration holders. Every call to [`Layer::wrap`]
/// creates a fresh outer service with its own runtime state, so a single
/// layer can be reused across many chains.
///
/// Implementations that only make sense over a particular service shape
/// bound `S` accordingly (for example the header layer requires
/// `S: Service<HttpRequest>`); wiring such a layer onto anything else is a
/// compile error at the [`ServiceBuilder::layer`] call.
pub trait Layer<S> {
    /// The service produced by wrapping `S`.
    type Service;

    /// Wraps `inner`.
    fn wrap(&self, inner: S) -> Self::Service;
}

impl<L, S> Layer<S> for &L
where
    L: Layer<S> + ?Sized,
{
    type Service = L::Service;

    fn wrap(&self, inner: S) -> Self::Service {
        (**self).wrap(inner)
    }
}

/// Fluent chain that starts from a base service and applies layers in order.
///
/// The chain's current service type is tracked in the type parameter: each
/// [`layer`](Self::layer) call is only accepted when the layer can wrap that
/// exact type, and yields a builder over the layer's output type. The builder
/// always holds a service, so [`build`](Self::build) is never reachable from
/// an empty chain.
///
/// The last layer added is the outermost one: it sees the request first and
/// the response last.
///
/// ```
/// use std::time::Duration;
/// use layerkit::{HttpService, OriginLayer, RetryConfig, RetryLayer, ServiceBuilder};
///
/// let service = ServiceBuilder::new(HttpService::new())
///     .layer(&OriginLayer::new("https://api.example.com"))
///     .layer(&RetryLayer::new(RetryConfig::new(3, Duration::from_millis(50))))
///     .build();
/// # let _ = service;
/// ```
#[derive(Clone, Debug)]
pub struct ServiceBuilder<S> {
    service: S,
}

impl<S> ServiceBuilder<S> {
    /// Starts a chain from `service`.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Wraps the current service with `layer`.
    pub fn layer<L>(self, layer: L) -> ServiceBuilder<L::Service>
    where
        L: Layer<S>,
    {
        ServiceBuilder {
            service: layer.wrap(self.service),
        }
    }

    /// Returns the composed service as a shareable handle.
    pub fn build(self) -> Arc<S> {
        Arc::new(self.service)
    }

    /// Returns the composed service by value.
    pub fn into_inner(self) -> S {
        self.service
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Layer, ServiceBuilder};
    use crate::{service_fn, Error, Result, Service};

    struct Tag(&'static str);

    struct Tagged<S> {
        inner: S,
        tag: &'static str,
    }

    impl<S> Layer<S> for Tag {
        type Service = Tagged<S>;

        fn wrap(&self, inner: S) -> Self::Service {
            Tagged { inner, tag: self.0 }
        }
    }

    impl<S> Service<String> for Tagged<S>
    where
        S: Service<String, Response = String>,
    {
        type Response = String;

        async fn call(&self, request: &String) -> Result<String> {
            let tagged = format!("{request}>{}", self.tag);
            let response = self.inner.call(&tagged).await?;
            Ok(format!("{response}<{}", self.tag))
        }
    }

    #[tokio::test]
    async fn last_layer_added_runs_first() {
        let base = service_fn(|request: String| async move { Ok::<_, Error>(format!("[{request}]")) });
        let svc = ServiceBuilder::new(base)
            .layer(Tag("inner"))
            .layer(Tag("outer"))
            .build();

        let response = svc.call(&"req".to_owned()).await.expect("call succeeds");
        assert_eq!(response, "[req>outer>inner]<inner<outer");
    }

    #[tokio::test]
    async fn layers_are_reusable_by_reference() {
        let layer = Tag("t");
        let base = Arc::new(service_fn(|request: String| async move { Ok::<_, Error>(request) }));

        let first = ServiceBuilder::new(Arc::clone(&base)).layer(&layer).build();
        let second = ServiceBuilder::new(base).layer(&layer).build();

        assert_eq!(first.call(&"a".to_owned()).await, Ok("a>t<t".to_owned()));
        assert_eq!(second.call(&"b".to_owned()).await, Ok("b>t<t".to_owned()));
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
