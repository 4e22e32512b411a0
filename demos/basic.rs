use std::time::Duration;

use layerkit::{
    HttpRequest, HttpService, JsonLayer, OriginLayer, RetryConfig, RetryLayer, Service,
    ServiceBuilder,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let origin = std::env::var("API_ORIGIN").unwrap_or_else(|_| "https://httpbin.org".to_owned());

    let api = ServiceBuilder::new(HttpService::new())
        .layer(OriginLayer::new(origin))
        .layer(RetryLayer::new(RetryConfig::new(3, Duration::from_millis(250))))
        .layer(JsonLayer)
        .build();

    let response = api
        .call(&HttpRequest::get("/get").with_header("Accept", "application/json"))
        .await?;

    println!("{} {}", response.status, response.url);
    match response.json() {
        Some(json) => println!("{json:#}"),
        None => println!("{}", response.body.text().unwrap_or("<binary body>")),
    }

    Ok(())
}
