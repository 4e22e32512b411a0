use reqwest::{header, Url};

use crate::{Error, HeaderMap, HttpRequest, HttpResponse, Result, Service};

/// Base service sending requests with `reqwest`.
///
/// Non-2xx statuses are returned as ordinary responses with
/// `succeeded == false`; only failures to build, send or read the exchange
/// become errors.
#[derive(Clone, Debug, Default)]
pub struct HttpService {
    client: reqwest::Client,
}

impl HttpService {
    /// Uses a default `reqwest::Client`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client (proxy, TLS, default headers, pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &HttpRequest) -> Result<reqwest::Request> {
        if request.url.trim().is_empty() {
            return Err(Error::InvalidTarget("request url is empty".to_owned()));
        }
        let url = Url::parse(&request.url)
            .map_err(|err| Error::InvalidTarget(format!("{:?}: {err}", request.url)))?;

        let mut builder = self.client.request(request.method.into(), url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(content_type) = &request.content_type {
            if !request.headers.contains(header::CONTENT_TYPE.as_str()) {
                builder = builder.header(header::CONTENT_TYPE, content_type);
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder
            .build()
            .map_err(|err| Error::RequestConstructionFailed(err.to_string()))
    }
}

fn collect_headers(headers: &header::HeaderMap) -> HeaderMap {
    let mut collected = HeaderMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        let merged = match collected.get(name.as_str()) {
            Some(existing) => format!("{existing}, {value}"),
            None => value.into_owned(),
        };
        collected.insert(name.as_str(), merged);
    }
    collected
}

impl Service<HttpRequest> for HttpService {
    type Response = HttpResponse;

    async fn call(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let outgoing = self.build(request)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("sending {} {}", outgoing.method(), outgoing.url());

        let response = self
            .client
            .execute(outgoing)
            .await
            .map_err(Error::from_send)?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = collect_headers(response.headers());
        let content_type = headers
            .get(header::CONTENT_TYPE.as_str())
            .unwrap_or_default()
            .to_owned();
        let body = response
            .bytes()
            .await
            .map_err(|err| Error::NoResponse(err.to_string()))?
            .to_vec();

        #[cfg(feature = "tracing")]
        tracing::debug!("received {status} from {url} ({} bytes)", body.len());

        Ok(HttpResponse {
            url,
            headers,
            body,
            content_type,
            ..HttpResponse::with_status(status)
        })
    }
}
