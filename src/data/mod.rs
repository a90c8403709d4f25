//! Core data models for the crypto price tracker
//!
//! This module contains the market data types shared by the cache, the
//! CoinGecko client, the HTTP service, and the CLI.

pub mod coingecko;
pub mod fallback;

pub use coingecko::{validate_coin_id, FetchError, MarketClient};
pub use fallback::{adjust_prices_for_currency, fallback_prices};

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single coin's market data as returned by `/coins/markets`
///
/// Field names follow the CoinGecko wire format so the same type can be
/// served back to clients unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRecord {
    /// CoinGecko identifier (e.g., "bitcoin")
    pub id: String,
    /// Ticker symbol, lowercase (e.g., "btc")
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Logo URL
    pub image: String,
    /// Price in the requested fiat currency
    pub current_price: f64,
    /// Market capitalization in the requested fiat currency
    pub market_cap: f64,
    /// Rank by market cap; null for unranked coins
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    /// 24 hour price change in percent
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    /// 24 hour trading volume
    pub total_volume: f64,
    /// When CoinGecko last updated this record
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fiat currencies supported for price display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Clp,
}

impl Currency {
    /// Parses a currency code, case-insensitive
    ///
    /// Returns `None` for codes outside the supported set.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Currency> {
        match s.trim().to_lowercase().as_str() {
            "usd" => Some(Currency::Usd),
            "eur" => Some(Currency::Eur),
            "clp" => Some(Currency::Clp),
            _ => None,
        }
    }

    /// Uppercase ISO code (e.g., "USD")
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Clp => "CLP",
        }
    }

    /// Lowercase code as expected by the CoinGecko `vs_currency` parameter
    pub fn api_code(&self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Eur => "eur",
            Currency::Clp => "clp",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd | Currency::Clp => "$",
            Currency::Eur => "€",
        }
    }

    /// Approximate conversion rate from USD, used only for static fallback data
    pub fn usd_multiplier(&self) -> f64 {
        match self {
            Currency::Usd => 1.0,
            Currency::Eur => 0.85,
            Currency::Clp => 850.0,
        }
    }

    pub fn all() -> [Currency; 3] {
        [Currency::Usd, Currency::Eur, Currency::Clp]
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Where a price list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Fetched from the API just now
    Live,
    /// Read back from the local cache after a failed fetch
    Cache,
    /// Built-in snapshot, used when neither live nor cached data is available
    Fallback,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::Cache => "cache",
            DataSource::Fallback => "fallback",
        }
    }
}

/// A price list for one currency along with its provenance
#[derive(Debug, Clone, Serialize)]
pub struct PriceSnapshot {
    pub currency: Currency,
    pub records: Vec<CurrencyRecord>,
    pub source: DataSource,
    /// When the data was fetched (for cached data, when it was cached)
    pub as_of: DateTime<Utc>,
}

/// Image URLs for a coin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinImage {
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

/// Market data for a coin, keyed by lowercase currency code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinMarketData {
    #[serde(default)]
    pub current_price: HashMap<String, f64>,
    #[serde(default)]
    pub market_cap: HashMap<String, f64>,
    #[serde(default)]
    pub total_volume: HashMap<String, f64>,
    #[serde(default)]
    pub high_24h: HashMap<String, f64>,
    #[serde(default)]
    pub low_24h: HashMap<String, f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub circulating_supply: Option<f64>,
}

/// Detailed information about a single coin from `/coins/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: CoinImage,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub market_data: CoinMarketData,
}

impl CoinDetail {
    /// Current price in the given currency, if CoinGecko reported one
    pub fn price_in(&self, currency: Currency) -> Option<f64> {
        self.market_data
            .current_price
            .get(currency.api_code())
            .copied()
    }

    pub fn market_cap_in(&self, currency: Currency) -> Option<f64> {
        self.market_data.market_cap.get(currency.api_code()).copied()
    }

    pub fn volume_in(&self, currency: Currency) -> Option<f64> {
        self.market_data
            .total_volume
            .get(currency.api_code())
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_from_str_is_case_insensitive() {
        assert_eq!(Currency::from_str("usd"), Some(Currency::Usd));
        assert_eq!(Currency::from_str("EUR"), Some(Currency::Eur));
        assert_eq!(Currency::from_str(" Clp "), Some(Currency::Clp));
        assert_eq!(Currency::from_str("gbp"), None);
        assert_eq!(Currency::from_str(""), None);
    }

    #[test]
    fn test_currency_codes_and_symbols() {
        assert_eq!(Currency::Usd.code(), "USD");
        assert_eq!(Currency::Eur.api_code(), "eur");
        assert_eq!(Currency::Eur.symbol(), "€");
        assert_eq!(Currency::Clp.symbol(), "$");
        assert_eq!(Currency::Clp.to_string(), "CLP");
    }

    #[test]
    fn test_currency_multipliers() {
        assert_eq!(Currency::Usd.usd_multiplier(), 1.0);
        assert_eq!(Currency::Eur.usd_multiplier(), 0.85);
        assert_eq!(Currency::Clp.usd_multiplier(), 850.0);
    }

    #[test]
    fn test_parse_markets_record() {
        let json = r#"{
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "image": "https://assets.coingecko.com/coins/images/1/large/bitcoin.png",
            "current_price": 43250.5,
            "market_cap": 847000000000,
            "market_cap_rank": 1,
            "price_change_percentage_24h": 2.5,
            "total_volume": 25000000000,
            "last_updated": "2024-01-15T12:00:00.000Z",
            "ath": 69000
        }"#;

        let record: CurrencyRecord = serde_json::from_str(json).expect("Failed to parse");
        assert_eq!(record.id, "bitcoin");
        assert_eq!(record.market_cap_rank, Some(1));
        assert_eq!(record.current_price, 43250.5);
        assert!(record.last_updated.is_some());
    }

    #[test]
    fn test_parse_record_with_null_optionals() {
        let json = r#"{
            "id": "newcoin",
            "symbol": "new",
            "name": "New Coin",
            "image": "",
            "current_price": 0.01,
            "market_cap": 0,
            "market_cap_rank": null,
            "price_change_percentage_24h": null,
            "total_volume": 10,
            "last_updated": null
        }"#;

        let record: CurrencyRecord = serde_json::from_str(json).expect("Failed to parse");
        assert!(record.market_cap_rank.is_none());
        assert!(record.price_change_percentage_24h.is_none());
        assert!(record.last_updated.is_none());
    }

    #[test]
    fn test_coin_detail_price_lookup() {
        let json = r#"{
            "id": "ethereum",
            "symbol": "eth",
            "name": "Ethereum",
            "image": {"large": "https://example.com/eth.png"},
            "market_cap_rank": 2,
            "market_data": {
                "current_price": {"usd": 2650.0, "eur": 2250.0},
                "market_cap": {"usd": 318000000000},
                "price_change_percentage_24h": 1.8
            }
        }"#;

        let detail: CoinDetail = serde_json::from_str(json).expect("Failed to parse");
        assert_eq!(detail.price_in(Currency::Usd), Some(2650.0));
        assert_eq!(detail.price_in(Currency::Eur), Some(2250.0));
        assert_eq!(detail.price_in(Currency::Clp), None);
        assert_eq!(detail.market_cap_in(Currency::Usd), Some(318000000000.0));
        assert!(detail.volume_in(Currency::Usd).is_none());
    }

    #[test]
    fn test_data_source_serializes_lowercase() {
        let json = serde_json::to_string(&DataSource::Fallback).unwrap();
        assert_eq!(json, "\"fallback\"");
        assert_eq!(DataSource::Cache.as_str(), "cache");
    }
}
