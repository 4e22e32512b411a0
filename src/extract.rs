use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::{ExtractedContent, HttpRequest, HttpResponse, JsonResponse, Layer, Result, Service};

/// Responses that expose raw bytes and a type key for extraction.
pub trait Extractable {
    /// Raw body handed to the extractor.
    fn body_bytes(&self) -> &[u8];

    /// Key selecting the extractor, normally the content type.
    fn type_key(&self) -> &str;
}

impl Extractable for HttpResponse {
    fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    fn type_key(&self) -> &str {
        &self.content_type
    }
}

impl Extractable for JsonResponse {
    fn body_bytes(&self) -> &[u8] {
        &self.body.raw
    }

    fn type_key(&self) -> &str {
        &self.content_type
    }
}

/// Converts raw body bytes into an opaque value; `None` when it cannot.
pub type Extractor = Arc<dyn Fn(&[u8]) -> Option<ExtractedContent> + Send + Sync>;

/// Media type without parameters, lower-cased: `Text/HTML; charset=utf-8` -> `text/html`.
fn essence(type_key: &str) -> String {
    type_key
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Runs a registered extractor over each successful response.
///
/// The extractor is chosen by the response's type key, first by exact match
/// and then by media-type essence. An unregistered key, an empty body or an
/// extractor returning `None` all leave the content absent; extraction never
/// fails a call that succeeded.
#[derive(Clone, Default)]
pub struct ExtractLayer {
    extractors: Arc<HashMap<String, Extractor>>,
}

impl ExtractLayer {
    /// Creates a layer with no extractors registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `extractor` for responses whose type key is `key`.
    pub fn register<T, F>(mut self, key: impl Into<String>, extractor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&[u8]) -> Option<T> + Send + Sync + 'static,
    {
        let extractor: Extractor =
            Arc::new(move |bytes: &[u8]| extractor(bytes).map(ExtractedContent::new));
        Arc::make_mut(&mut self.extractors).insert(key.into(), extractor);
        self
    }

    /// Registers a serde extractor decoding the body as JSON into `T`.
    pub fn register_json<T>(self, key: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Any + Send + Sync,
    {
        self.register(key, |bytes: &[u8]| serde_json::from_slice::<T>(bytes).ok())
    }

    /// Returns `true` if responses typed `key` would find an extractor.
    pub fn is_registered(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn lookup(&self, type_key: &str) -> Option<&Extractor> {
        self.extractors
            .get(type_key)
            .or_else(|| self.extractors.get(&essence(type_key)))
    }

    fn extract<R: Extractable>(&self, response: &R) -> Option<ExtractedContent> {
        let bytes = response.body_bytes();
        if bytes.is_empty() {
            return None;
        }
        let Some(extractor) = self.lookup(response.type_key()) else {
            #[cfg(feature = "tracing")]
            tracing::trace!("no extractor registered for {:?}", response.type_key());
            return None;
        };
        extractor(bytes)
    }
}

impl fmt::Debug for ExtractLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("ExtractLayer").field("keys", &keys).finish()
    }
}

impl<S> Layer<S> for ExtractLayer
where
    S: Service<HttpRequest>,
    S::Response: Extractable,
{
    type Service = ExtractService<S>;

    fn wrap(&self, inner: S) -> Self::Service {
        ExtractService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`ExtractLayer`].
#[derive(Debug)]
pub struct ExtractService<S> {
    inner: S,
    layer: ExtractLayer,
}

/// A response paired with whatever its extractor produced.
#[derive(Clone, Debug)]
pub struct ExtractedResponse<R> {
    /// The inner response, unchanged.
    pub response: R,
    /// Extractor output; `None` when nothing was extracted.
    pub content: Option<ExtractedContent>,
}

impl<R> ExtractedResponse<R> {
    /// Borrows the extracted content as `T`; `None` if absent or of another type.
    pub fn content<T: Any>(&self) -> Option<&T> {
        self.content.as_ref()?.downcast_ref::<T>()
    }
}

impl<S> Service<HttpRequest> for ExtractService<S>
where
    S: Service<HttpRequest>,
    S::Response: Extractable,
{
    type Response = ExtractedResponse<S::Response>;

    async fn call(&self, request: &HttpRequest) -> Result<Self::Response> {
        let response = self.inner.call(request).await?;
        let content = self.layer.extract(&response);
        Ok(ExtractedResponse { response, content })
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::{essence, ExtractLayer};
    use crate::{
        service_fn, Error, HttpRequest, HttpResponse, JsonLayer, Service, ServiceBuilder,
    };

    #[derive(Debug, Deserialize, PartialEq)]
    struct Page {
        title: String,
    }

    fn responding(
        content_type: &'static str,
        body: &'static str,
    ) -> impl Service<HttpRequest, Response = HttpResponse> {
        service_fn(move |_: HttpRequest| async move {
            Ok::<_, Error>(
                HttpResponse::with_status(200)
                    .with_content_type(content_type)
                    .with_body(body),
            )
        })
    }

    fn text_layer() -> ExtractLayer {
        ExtractLayer::new().register("text/plain", |bytes: &[u8]| {
            std::str::from_utf8(bytes).ok().map(str::to_uppercase)
        })
    }

    #[test]
    fn essence_strips_parameters_and_case() {
        assert_eq!(essence("Application/JSON; charset=utf-8"), "application/json");
        assert_eq!(essence("text/plain"), "text/plain");
        assert_eq!(essence(""), "");
    }

    #[tokio::test]
    async fn registered_key_extracts_content() {
        let svc = ServiceBuilder::new(responding("text/plain", "hello"))
            .layer(text_layer())
            .build();

        let extracted = svc.call(&HttpRequest::get("/")).await.expect("call succeeds");
        assert_eq!(extracted.content::<String>().map(String::as_str), Some("HELLO"));
        assert_eq!(extracted.response.body, b"hello".to_vec());
    }

    #[tokio::test]
    async fn lookup_falls_back_to_media_type_essence() {
        let svc = ServiceBuilder::new(responding("Text/Plain; charset=utf-8", "hi"))
            .layer(text_layer())
            .build();

        let extracted = svc.call(&HttpRequest::get("/")).await.expect("call succeeds");
        assert_eq!(extracted.content::<String>().map(String::as_str), Some("HI"));
    }

    #[tokio::test]
    async fn unregistered_key_leaves_content_absent() {
        let svc = ServiceBuilder::new(responding("image/png", "\u{89}PNG"))
            .layer(text_layer())
            .build();

        let extracted = svc.call(&HttpRequest::get("/")).await.expect("call succeeds");
        assert!(extracted.content.is_none());
    }

    #[tokio::test]
    async fn empty_body_leaves_content_absent() {
        let svc = ServiceBuilder::new(responding("text/plain", ""))
            .layer(text_layer())
            .build();

        let extracted = svc.call(&HttpRequest::get("/")).await.expect("call succeeds");
        assert!(extracted.content.is_none());
    }

    #[tokio::test]
    async fn json_extractor_over_json_layer() {
        let svc = ServiceBuilder::new(responding("application/json", r#"{"title":"Home"}"#))
            .layer(JsonLayer)
            .layer(ExtractLayer::new().register_json::<Page>("application/json"))
            .build();

        let extracted = svc.call(&HttpRequest::get("/")).await.expect("call succeeds");
        assert_eq!(extracted.content::<Page>(), Some(&Page { title: "Home".to_owned() }));
        assert!(extracted.response.json().is_some());
        assert_eq!(extracted.content::<String>(), None);
    }

    #[tokio::test]
    async fn failed_extraction_is_still_a_success() {
        let svc = ServiceBuilder::new(responding("application/json", "not json"))
            .layer(ExtractLayer::new().register_json::<Page>("application/json"))
            .build();

        let extracted = svc.call(&HttpRequest::get("/")).await.expect("call succeeds");
        assert!(extracted.content.is_none());
    }

    #[tokio::test]
    async fn inner_errors_propagate() {
        let failing = service_fn(|_: HttpRequest| async {
            Err::<HttpResponse, _>(Error::NoResponse("empty".to_owned()))
        });
        let svc = ServiceBuilder::new(failing).layer(text_layer()).build();

        let err = svc.call(&HttpRequest::get("/")).await.expect_err("inner fails");
        assert_eq!(err, Error::NoResponse("empty".to_owned()));
    }
}
