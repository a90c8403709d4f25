//! Integration tests for the HTTP service
//!
//! Drives the router in-process with a mock upstream API.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use mockito::{Matcher, Server};
use serde_json::Value;
use tower::ServiceExt;

use cryptotrack::cache::{MemoryStore, PriceCache};
use cryptotrack::data::MarketClient;
use cryptotrack::prices::{PriceService, RetryPolicy};
use cryptotrack::server::rate_limit::RateLimiter;
use cryptotrack::server::{router, AppState, DATA_SOURCE_HEADER, PRICES_CACHE_CONTROL};

fn markets_body() -> String {
    serde_json::json!([
        {
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "image": "https://example.com/btc.png",
            "current_price": 36000.0,
            "market_cap": 700000000000.0,
            "market_cap_rank": 1,
            "price_change_percentage_24h": 2.5,
            "total_volume": 15000000000.0,
            "last_updated": "2024-01-15T12:00:00.000Z"
        }
    ])
    .to_string()
}

fn app(api_base: &str, limit: u32) -> Router {
    let prices = PriceService::new(
        MarketClient::with_base_url(api_base),
        Some(PriceCache::new(Arc::new(MemoryStore::new()))),
    )
    .with_retry(RetryPolicy {
        max_retries: 0,
        interval: Duration::from_millis(1),
    });

    router(AppState {
        prices: Arc::new(prices),
        limiter: Arc::new(RateLimiter::new(limit, chrono::Duration::seconds(60))),
        base_url: "https://prices.example.org".to_string(),
    })
}

fn get(uri: &str, caller: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", caller)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_live_prices_with_cache_headers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/coins/markets")
        .match_query(Matcher::UrlEncoded("vs_currency".into(), "eur".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(markets_body())
        .create_async()
        .await;

    let response = app(&server.url(), 10)
        .oneshot(get("/api/crypto?currency=EUR", "198.51.100.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        PRICES_CACHE_CONTROL
    );
    assert_eq!(response.headers().get(DATA_SOURCE_HEADER).unwrap(), "live");

    let body = body_json(response).await;
    let coins = body.as_array().unwrap();
    assert_eq!(coins.len(), 1);
    assert_eq!(coins[0]["id"], "bitcoin");
    assert_eq!(coins[0]["current_price"], 36000.0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upstream_rate_limit_serves_fallback() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/coins/markets")
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let response = app(&server.url(), 10)
        .oneshot(get("/api/crypto", "198.51.100.2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(DATA_SOURCE_HEADER).unwrap(),
        "fallback"
    );

    let body = body_json(response).await;
    let coins = body.as_array().unwrap();
    assert_eq!(coins.len(), 10);
    assert_eq!(coins[0]["id"], "bitcoin");
}

#[tokio::test]
async fn test_eleventh_request_is_rejected() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/coins/markets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(markets_body())
        .create_async()
        .await;

    let app = app(&server.url(), 10);

    for _ in 0..10 {
        let response = app
            .clone()
            .oneshot(get("/api/crypto", "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(get("/api/crypto", "203.0.113.9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let body = body_json(response).await;
    assert_eq!(body["error"], "Rate limit exceeded. Please try again later.");

    // Other callers have their own window
    let response = app
        .oneshot(get("/api/crypto", "203.0.113.10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unsupported_currency_is_bad_request() {
    let server = Server::new_async().await;

    let response = app(&server.url(), 10)
        .oneshot(get("/api/crypto?currency=gbp", "198.51.100.3"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("gbp"));
}

#[tokio::test]
async fn test_unknown_coin_is_not_found() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/coins/no-such-coin")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let app = app(&server.url(), 10);

    let response = app
        .clone()
        .oneshot(get("/api/coins/no-such-coin", "198.51.100.4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Malformed ids never reach upstream
    let response = app
        .oneshot(get("/api/coins/Not_A_Coin", "198.51.100.4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sitemap_lists_locales() {
    let server = Server::new_async().await;

    let response = app(&server.url(), 10)
        .oneshot(get("/sitemap.xml", "198.51.100.5"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/xml"
    );
    let xml = body_text(response).await;
    assert!(xml.contains("<loc>https://prices.example.org</loc>"));
    assert!(xml.contains("<loc>https://prices.example.org/es</loc>"));
}
