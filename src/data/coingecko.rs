//! CoinGecko API client
//!
//! Fetches the top coins by market cap and single-coin details, classifying
//! failures so the caller can decide between retrying and falling back.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::{CoinDetail, Currency, CurrencyRecord};

/// Base URL for the CoinGecko public API
pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

const USER_AGENT: &str = "CryptoTracker/1.0";

/// Longest coin id accepted before it is treated as unknown
const MAX_COIN_ID_LEN: usize = 50;

/// Errors that can occur when talking to the market data API
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout, or body read failure
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream answered 429
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Unknown coin identifier
    #[error("Coin not found: {0}")]
    NotFound(String),

    /// Any other non-success status
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    /// Response body was not the expected JSON
    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FetchError {
    /// Whether a retry has a chance of succeeding
    ///
    /// Rate limits are not retried immediately, and unknown ids stay unknown.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Parse(_) => true,
            FetchError::Status(code) => *code >= 500,
            FetchError::RateLimited | FetchError::NotFound(_) => false,
        }
    }
}

/// Checks that a coin id looks like a CoinGecko id
///
/// Ids are lowercase ASCII alphanumerics and hyphens, at most 50 characters.
pub fn validate_coin_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_COIN_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Client for the CoinGecko market data API
#[derive(Debug, Clone)]
pub struct MarketClient {
    client: Client,
    base_url: String,
}

impl MarketClient {
    /// Creates a client against `base_url`, e.g. [`COINGECKO_API_BASE`]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetches the top `limit` coins by market cap, priced in `currency`
    ///
    /// # Returns
    /// * `Ok(Vec<CurrencyRecord>)` - Coins ordered by market cap, descending
    /// * `Err(FetchError::RateLimited)` - Upstream answered 429
    /// * `Err(FetchError)` - Any other transport, status, or parse failure
    pub async fn fetch_markets(
        &self,
        currency: Currency,
        limit: usize,
    ) -> Result<Vec<CurrencyRecord>, FetchError> {
        let url = format!(
            "{}/coins/markets?vs_currency={}&order=market_cap_desc&per_page={}&page=1&sparkline=false&price_change_percentage=24h",
            self.base_url,
            currency.api_code(),
            limit
        );

        self.get_json(&url, None).await
    }

    /// Fetches details for a single coin
    ///
    /// Ids that fail [`validate_coin_id`] are reported as `NotFound` without
    /// a request being made.
    pub async fn fetch_coin(&self, id: &str) -> Result<CoinDetail, FetchError> {
        if !validate_coin_id(id) {
            return Err(FetchError::NotFound(id.to_string()));
        }

        let url = format!(
            "{}/coins/{}?localization=false&tickers=false&community_data=false&developer_data=false&sparkline=false",
            self.base_url, id
        );

        self.get_json(&url, Some(id)).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        coin_id: Option<&str>,
    ) -> Result<T, FetchError> {
        debug!(url, "requesting market data");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, coin_id));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn classify_status(status: StatusCode, coin_id: Option<&str>) -> FetchError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        StatusCode::NOT_FOUND => FetchError::NotFound(coin_id.unwrap_or_default().to_string()),
        other => FetchError::Status(other.as_u16()),
    }
}
