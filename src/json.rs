use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, HeaderMap, HttpRequest, HttpResponse, Layer, Result, Service};

/// Response body with its JSON parse, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonBody {
    /// Raw bytes as received.
    pub raw: Vec<u8>,
    /// Parsed document; `None` when the body is empty or not valid JSON.
    pub value: Option<Value>,
}

impl JsonBody {
    /// Parses `raw`, keeping the bytes whether or not parsing succeeds.
    pub fn parse(raw: Vec<u8>) -> Self {
        let value = parse_json(&raw);
        Self { raw, value }
    }

    /// Returns the raw body as text when it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.raw).ok()
    }

    /// Converts the parsed document into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body did not parse as JSON or does
    /// not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self
            .value
            .as_ref()
            .ok_or_else(|| Error::Decode("response body is not JSON".to_owned()))?;
        T::deserialize(value).map_err(|err| Error::Decode(err.to_string()))
    }
}

fn parse_json(raw: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(raw).ok()?;
    if text.trim().is_empty() {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// [`HttpResponse`] whose body has been run through the JSON parser.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonResponse {
    /// Final URL after redirects.
    pub url: String,
    /// Status code of the inner response.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw bytes plus their JSON parse.
    pub body: JsonBody,
    /// Echoed `Content-Type`, empty when absent.
    pub content_type: String,
    /// `true` for 2xx statuses.
    pub succeeded: bool,
}

impl JsonResponse {
    /// Parsed JSON document, if the body held one.
    pub fn json(&self) -> Option<&Value> {
        self.body.value.as_ref()
    }
}

impl From<HttpResponse> for JsonResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            url: response.url,
            status: response.status,
            headers: response.headers,
            body: JsonBody::parse(response.body),
            content_type: response.content_type,
            succeeded: response.succeeded,
        }
    }
}

/// Parses successful response bodies as JSON.
///
/// Requests are forwarded unchanged. A body that is empty or not JSON still
/// yields a successful [`JsonResponse`] whose `body.value` is `None`; inner
/// errors propagate untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonLayer;

impl JsonLayer {
    /// Creates the layer; equivalent to `JsonLayer`.
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for JsonLayer
where
    S: Service<HttpRequest, Response = HttpResponse>,
{
    type Service = JsonService<S>;

    fn wrap(&self, inner: S) -> Self::Service {
        JsonService { inner }
    }
}

/// Service produced by [`JsonLayer`].
#[derive(Debug)]
pub struct JsonService<S> {
    inner: S,
}

impl<S> Service<HttpRequest> for JsonService<S>
where
    S: Service<HttpRequest, Response = HttpResponse>,
{
    type Response = JsonResponse;

    async fn call(&self, request: &HttpRequest) -> Result<JsonResponse> {
        let response = self.inner.call(request).await?;
        Ok(JsonResponse::from(response))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::{JsonBody, JsonLayer};
    use crate::{service_fn, Error, ErrorKind, HttpRequest, HttpResponse, Service, ServiceBuilder};

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    fn responding(body: &'static str) -> impl Service<HttpRequest, Response = HttpResponse> {
        service_fn(move |request: HttpRequest| async move {
            let mut response = HttpResponse::with_status(200)
                .with_content_type("application/json")
                .with_header("X-Request", request.url.clone())
                .with_body(body);
            response.url = request.url;
            Ok::<_, Error>(response)
        })
    }

    #[tokio::test]
    async fn parses_json_and_keeps_metadata() {
        let svc = ServiceBuilder::new(responding(r#"{"id":7,"name":"kit"}"#))
            .layer(JsonLayer)
            .build();

        let response = svc.call(&HttpRequest::get("https://x.test/u")).await.expect("call succeeds");

        assert_eq!(response.json(), Some(&json!({ "id": 7, "name": "kit" })));
        assert_eq!(response.status, 200);
        assert!(response.succeeded);
        assert_eq!(response.url, "https://x.test/u");
        assert_eq!(response.content_type, "application/json");
        assert_eq!(response.headers.get("x-request"), Some("https://x.test/u"));
        assert_eq!(
            response.body.deserialize::<User>(),
            Ok(User { id: 7, name: "kit".to_owned() })
        );
    }

    #[tokio::test]
    async fn invalid_json_is_still_a_success() {
        let svc = ServiceBuilder::new(responding("<html>oops</html>"))
            .layer(JsonLayer::new())
            .build();

        let response = svc.call(&HttpRequest::get("/")).await.expect("call succeeds");

        assert_eq!(response.json(), None);
        assert_eq!(response.body.text(), Some("<html>oops</html>"));
        assert_eq!(
            response.body.deserialize::<User>().map_err(|err| err.kind()),
            Err(ErrorKind::Decode)
        );
    }

    #[test]
    fn empty_or_blank_bodies_have_no_value() {
        assert_eq!(JsonBody::parse(Vec::new()).value, None);
        assert_eq!(JsonBody::parse(b" \n\t".to_vec()).value, None);
        assert_eq!(JsonBody::parse(vec![0xff, 0xfe]).value, None);
        assert_eq!(JsonBody::parse(b"[1,2]".to_vec()).value, Some(json!([1, 2])));
    }

    #[test]
    fn mismatched_shape_is_a_decode_error() {
        let body = JsonBody::parse(br#"{"id":"seven"}"#.to_vec());
        let err = body.deserialize::<User>().expect_err("id is not a number");
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn inner_errors_propagate() {
        let failing = service_fn(|_: HttpRequest| async {
            Err::<HttpResponse, _>(Error::ConnectionFailed("refused".to_owned()))
        });
        let svc = ServiceBuilder::new(failing).layer(JsonLayer).build();

        let err = svc.call(&HttpRequest::get("/")).await.expect_err("inner fails");
        assert_eq!(err, Error::ConnectionFailed("refused".to_owned()));
    }
}
