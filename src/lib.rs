//! `layerkit` composes asynchronous request/response services from
//! independent middleware layers.
//!
//! A chain starts from a base [`Service`] (usually [`HttpService`]) and is
//! wrapped by [`Layer`]s through a [`ServiceBuilder`]:
//! - [`RetryLayer`]: fixed-delay retry with an optional success challenge
//! - [`RateLimitLayer`]: token bucket with optional bounded waiting
//! - [`HeaderInjectionLayer`]: static, lazy and async header values
//! - [`OriginLayer`]: resolves relative URLs against an origin
//! - [`JsonLayer`]: parses response bodies as JSON
//! - [`ExtractLayer`]: typed extraction keyed by content type
//!
//! ```no_run
//! use std::time::Duration;
//! use layerkit::{
//!     HeaderInjectionLayer, HttpRequest, HttpService, JsonLayer, OriginLayer, RateLimitConfig,
//!     RateLimitLayer, RetryConfig, RetryLayer, Service, ServiceBuilder,
//! };
//!
//! # async fn run() -> layerkit::Result<()> {
//! let api = ServiceBuilder::new(HttpService::new())
//!     .layer(OriginLayer::new("https://api.example.com"))
//!     .layer(HeaderInjectionLayer::from_headers([("Accept", "application/json")], false))
//!     .layer(RetryLayer::new(RetryConfig::new(3, Duration::from_millis(200))))
//!     .layer(RateLimitLayer::new(RateLimitConfig::default()))
//!     .layer(JsonLayer)
//!     .build();
//!
//! let response = api.call(&HttpRequest::get("/v1/status")).await?;
//! println!("{} {:?}", response.status, response.json());
//! # Ok(())
//! # }
//! ```

mod content;
mod error;
mod extract;
mod headers;
mod json;
mod layer;
mod options;
mod origin;
mod provider;
mod rate_limit;
mod retry;
mod service;
mod transport;
mod types;

pub use content::ExtractedContent;
pub use error::{Error, ErrorKind};
pub use extract::{Extractable, ExtractLayer, ExtractService, ExtractedResponse, Extractor};
pub use headers::{
    AsyncHeaderProvider, HeaderInjectionConfig, HeaderInjectionLayer, HeaderInjectionService,
    LazyHeaderProvider,
};
pub use json::{JsonBody, JsonLayer, JsonResponse, JsonService};
pub use layer::{Layer, ServiceBuilder};
pub use options::{RateLimitConfig, RetryConfig};
pub use origin::{combine_url, OriginLayer, OriginProvider, OriginService};
pub use provider::{ProvideService, ServiceRegistry};
pub use rate_limit::{RateLimitLayer, RateLimitService, TokenBucket};
pub use retry::{AcceptAll, Challenge, RetryLayer, RetryService};
pub use service::{service_fn, BoxFuture, Service, ServiceFn};
pub use transport::HttpService;
pub use types::{HeaderMap, HttpRequest, HttpResponse, Method};

pub type Result<T> = std::result::Result<T, Error>;
