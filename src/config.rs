//! Runtime configuration loaded from the environment

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::coingecko::COINGECKO_API_BASE;
use crate::server::rate_limit::{DEFAULT_RATE_LIMIT, DEFAULT_WINDOW_SECS};

/// Public URL used when `CRYPTOTRACK_BASE_URL` is not set
pub const DEFAULT_BASE_URL: &str = "https://crypto-tracker.vercel.app";

pub const DEFAULT_PORT: u16 = 3000;

/// Longest accepted rate limit window: one year
pub const MAX_RATE_WINDOW_SECS: i64 = 86_400 * 365;

/// Error types for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable is set but cannot be used
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Settings shared by the CLI and the HTTP service
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// CoinGecko API base URL
    pub api_base: String,
    /// Public site URL, used for the sitemap
    pub base_url: String,
    /// Port for `serve`
    pub port: u16,
    /// Cache directory override; `None` uses the XDG cache directory
    pub cache_dir: Option<PathBuf>,
    /// Requests per caller per window for `/api/crypto`
    pub rate_limit: u32,
    /// Rate limit window in seconds
    pub rate_window_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: COINGECKO_API_BASE.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            port: DEFAULT_PORT,
            cache_dir: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// A `.env` file in the working directory is read first, if present.
    ///
    /// Optional:
    /// - `CRYPTOTRACK_API_BASE`: CoinGecko API base URL
    /// - `CRYPTOTRACK_BASE_URL`: public site URL for the sitemap
    /// - `CRYPTOTRACK_PORT`: port to bind `serve` to (default: 3000)
    /// - `CRYPTOTRACK_CACHE_DIR`: directory for cached prices
    /// - `CRYPTOTRACK_RATE_LIMIT`: requests per caller per window (default: 10)
    /// - `CRYPTOTRACK_RATE_WINDOW_SECS`: rate limit window (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Loads configuration through a variable lookup function
    ///
    /// Empty values are treated as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        Ok(Self {
            api_base: get("CRYPTOTRACK_API_BASE").unwrap_or(defaults.api_base),
            base_url: get("CRYPTOTRACK_BASE_URL").unwrap_or(defaults.base_url),
            port: parse_var("CRYPTOTRACK_PORT", get("CRYPTOTRACK_PORT"))?
                .unwrap_or(defaults.port),
            cache_dir: get("CRYPTOTRACK_CACHE_DIR").map(PathBuf::from),
            rate_limit: parse_var("CRYPTOTRACK_RATE_LIMIT", get("CRYPTOTRACK_RATE_LIMIT"))?
                .unwrap_or(defaults.rate_limit),
            rate_window_secs: parse_window(get("CRYPTOTRACK_RATE_WINDOW_SECS"))?
                .unwrap_or(defaults.rate_window_secs),
        })
    }
}

/// Non-positive windows fall back to the default; windows over a year are rejected
fn parse_window(value: Option<String>) -> Result<Option<i64>, ConfigError> {
    const VAR: &str = "CRYPTOTRACK_RATE_WINDOW_SECS";

    match parse_var::<i64>(VAR, value)? {
        Some(secs) if secs > MAX_RATE_WINDOW_SECS => Err(ConfigError::InvalidValue {
            var: VAR,
            reason: format!("{} exceeds the maximum of {} seconds", secs, MAX_RATE_WINDOW_SECS),
        }),
        Some(secs) if secs > 0 => Ok(Some(secs)),
        _ => Ok(None),
    }
}

fn parse_var<T>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                var,
                reason: format!("{:?}: {}", v, e),
            })
        })
        .transpose()
}
