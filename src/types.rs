use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::{Error, Result};

/// HTTP verbs understood by the base transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`, the default.
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
    /// `HEAD`
    Head,
}

impl Method {
    /// Upper-case verb as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

/// Insertion-ordered header map with case-insensitive names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `name`, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .map(|index| self.entries[index].1.as_str())
    }

    /// Returns `true` if a header named `name` is present, ignoring ASCII case.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Sets `name` to `value`, replacing any existing entry with the same name.
    ///
    /// A replaced entry keeps its position and original spelling.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Removes `name` and returns its value, if present.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name)
            .map(|index| self.entries.remove(index).1)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no header is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Outbound request flowing through a chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL or a path relative to an origin supplied by a layer.
    pub url: String,
    /// HTTP verb, `GET` by default.
    pub method: Method,
    /// Request headers; names compare case-insensitively.
    pub headers: HeaderMap,
    /// Sent as `Content-Type` unless `headers` already carries one.
    pub content_type: Option<String>,
    /// Raw body; sent only when non-empty.
    pub body: Vec<u8>,
    /// Per-request timeout enforced by the transport.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Creates a `GET` request for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Same as [`HttpRequest::new`].
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url)
    }

    /// Creates a `POST` request for `url`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(url).with_method(Method::Post)
    }

    /// Creates a `PUT` request for `url`.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(url).with_method(Method::Put)
    }

    /// Creates a `DELETE` request for `url`.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(url).with_method(Method::Delete)
    }

    /// Creates a `PATCH` request for `url`.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(url).with_method(Method::Patch)
    }

    /// Creates a `HEAD` request for `url`.
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(url).with_method(Method::Head)
    }

    /// Sets the HTTP verb.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets a header, replacing any value already stored under that name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the content type sent when no explicit `Content-Type` header exists.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the raw body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the JSON body and sets the JSON content type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestConstructionFailed`] if `value` cannot be
    /// serialized.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(|err| {
            Error::RequestConstructionFailed(format!("request body is not serializable: {err}"))
        })?;
        Ok(self
            .with_content_type("application/json")
            .with_body(body))
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response produced by the base transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub url: String,
    /// Status code; `0` means no response was received.
    pub status: u16,
    /// Response headers; repeated headers are joined with `", "`.
    pub headers: HeaderMap,
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Echoed `Content-Type`, empty when absent.
    pub content_type: String,
    /// `true` for 2xx statuses.
    pub succeeded: bool,
}

impl HttpResponse {
    /// Creates an empty response with `status`, deriving the success flag.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            succeeded: is_success_status(status),
            ..Self::default()
        }
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Sets a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the body as text when it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

pub(crate) fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}
