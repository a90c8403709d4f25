//! HTTP service exposing prices to browser clients
//!
//! Routes:
//! - `GET /api/crypto?currency=<code>`: top coins, rate limited per caller
//! - `GET /api/coins/:id?currency=<code>`: single coin details
//! - `GET /sitemap.xml`

pub mod rate_limit;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::data::{Currency, FetchError};
use crate::prices::PriceService;
use crate::sitemap;
use rate_limit::RateLimiter;

/// Shared-cache policy for price responses: 5 minutes fresh, 10 minutes stale
pub const PRICES_CACHE_CONTROL: &str = "public, s-maxage=300, stale-while-revalidate=600";

/// Header naming where the returned prices came from
pub const DATA_SOURCE_HEADER: &str = "x-data-source";

/// State shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub prices: Arc<PriceService>,
    pub limiter: Arc<RateLimiter>,
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CurrencyQuery {
    currency: Option<String>,
}

/// Builds the router with request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/crypto", get(get_prices))
        .route("/api/coins/:id", get(get_coin))
        .route("/sitemap.xml", get(get_sitemap))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router on `addr` until the process is stopped
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router(state)).await
}

/// Caller identity for rate limiting: the first `X-Forwarded-For` hop
pub fn caller_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn parse_currency(query: &CurrencyQuery) -> Result<Currency, Box<Response>> {
    match query.currency.as_deref() {
        None | Some("") => Ok(Currency::default()),
        Some(code) => Currency::from_str(code).ok_or_else(|| {
            Box::new(error_response(
                StatusCode::BAD_REQUEST,
                &format!("Unsupported currency: {}", code),
            ))
        }),
    }
}

async fn get_prices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CurrencyQuery>,
) -> Response {
    let caller = caller_identity(&headers);
    if let Err(limited) = state.limiter.check(&caller) {
        warn!(caller = %caller, retry_after_secs = limited.retry_after.num_seconds(), "rate limit exceeded");
        let mut response = error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        );
        if let Ok(value) = HeaderValue::from_str(&limited.retry_after.num_seconds().max(1).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    let currency = match parse_currency(&query) {
        Ok(currency) => currency,
        Err(response) => return *response,
    };

    let snapshot = state.prices.fetch_prices(currency).await;

    let mut response = Json(snapshot.records).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(PRICES_CACHE_CONTROL),
    );
    headers.insert(
        DATA_SOURCE_HEADER,
        HeaderValue::from_static(snapshot.source.as_str()),
    );
    response
}

async fn get_coin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CurrencyQuery>,
) -> Response {
    // Validated so unsupported codes get a 400 rather than an empty price map
    if let Err(response) = parse_currency(&query) {
        return *response;
    }

    match state.prices.fetch_coin(&id).await {
        Ok(detail) => Json(detail).into_response(),
        Err(FetchError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, "Coin not found"),
        Err(FetchError::RateLimited) => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        ),
        Err(e) => {
            error!(coin = %id, error = %e, "coin detail fetch failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch cryptocurrency data",
            )
        }
    }
}

async fn get_sitemap(State(state): State<AppState>) -> Response {
    let xml = sitemap::render_xml(&sitemap::entries(&state.base_url, Utc::now()));
    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketClient;
    use crate::prices::RetryPolicy;

    #[test]
    fn test_caller_identity_uses_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(caller_identity(&headers), "203.0.113.7");
    }

    #[test]
    fn test_caller_identity_defaults_to_unknown() {
        assert_eq!(caller_identity(&HeaderMap::new()), "unknown");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(caller_identity(&headers), "unknown");
    }

    #[test]
    fn test_parse_currency_query() {
        let query = |c: Option<&str>| CurrencyQuery {
            currency: c.map(String::from),
        };

        assert_eq!(parse_currency(&query(None)).unwrap(), Currency::Usd);
        assert_eq!(parse_currency(&query(Some("eur"))).unwrap(), Currency::Eur);
        assert_eq!(parse_currency(&query(Some("CLP"))).unwrap(), Currency::Clp);

        let rejected = parse_currency(&query(Some("gbp"))).unwrap_err();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_router_builds() {
        let state = AppState {
            prices: Arc::new(
                PriceService::new(MarketClient::with_base_url("http://127.0.0.1:9"), None)
                    .with_retry(RetryPolicy::none()),
            ),
            limiter: Arc::new(RateLimiter::default()),
            base_url: "https://example.com".to_string(),
        };
        let _router = router(state);
    }
}
