use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use layerkit::{
    ExtractLayer, HeaderInjectionConfig, HeaderInjectionLayer, HttpRequest, HttpResponse,
    HttpService, JsonLayer, OriginLayer, RateLimitConfig, RateLimitLayer, RetryConfig, RetryLayer,
    Service, ServiceBuilder,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Uuid {
    uuid: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let request_ids = Arc::new(AtomicU64::new(1));

    let headers = HeaderInjectionConfig::new()
        .with_header("User-Agent", "layerkit-demo")
        .with_lazy_header("X-Request-Id", {
            let ids = Arc::clone(&request_ids);
            move || ids.fetch_add(1, Ordering::Relaxed).to_string()
        })
        .with_async_header("Authorization", || async {
            // Stand-in for a token refresh.
            tokio::time::sleep(Duration::from_millis(5)).await;
            "Bearer demo-token".to_owned()
        });

    let retry = RetryConfig::new(3, Duration::from_millis(200))
        .with_challenge(|response: &HttpResponse| response.status < 500);

    let api = ServiceBuilder::new(HttpService::new())
        .layer(OriginLayer::from_provider(|| async {
            std::env::var("API_ORIGIN").unwrap_or_else(|_| "https://httpbin.org".to_owned())
        }))
        .layer(HeaderInjectionLayer::new(headers))
        .layer(RetryLayer::new(retry))
        .layer(RateLimitLayer::new(
            RateLimitConfig::new(2.0, 2.0).with_max_wait(Duration::from_secs(5)),
        ))
        .layer(JsonLayer)
        .layer(ExtractLayer::new().register_json::<Uuid>("application/json"))
        .build();

    for _ in 0..4 {
        let extracted = api.call(&HttpRequest::get("/uuid")).await?;
        match extracted.content::<Uuid>() {
            Some(uuid) => println!("{} -> {}", extracted.response.status, uuid.uuid),
            None => println!("{} -> no uuid in body", extracted.response.status),
        }
    }

    Ok(())
}
