//! Command-line interface parsing for cryptotrack
//!
//! This module defines the subcommands and handles parsing of currency
//! arguments using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::data::Currency;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified currency is not supported
    #[error("Invalid currency: '{0}'. Valid currencies: USD, EUR, CLP")]
    InvalidCurrency(String),
}

/// Parses a currency argument, case-insensitive
///
/// # Returns
/// * `Ok(Currency)` if the code is supported
/// * `Err(CliError::InvalidCurrency)` otherwise
pub fn parse_currency_arg(s: &str) -> Result<Currency, CliError> {
    Currency::from_str(s).ok_or_else(|| CliError::InvalidCurrency(s.to_string()))
}

/// cryptotrack - Cryptocurrency prices with offline fallback
#[derive(Parser, Debug)]
#[command(name = "cryptotrack")]
#[command(about = "Cryptocurrency prices with local caching and offline fallback")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Cache directory (defaults to the XDG cache directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the top coins by market cap
    Prices {
        /// Fiat currency: USD, EUR, or CLP
        #[arg(short, long, default_value = "USD", value_parser = parse_currency_arg)]
        currency: Currency,

        /// Number of coins to request
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show details for a single coin
    Coin {
        /// CoinGecko coin id (e.g., "bitcoin")
        id: String,

        /// Fiat currency: USD, EUR, or CLP
        #[arg(short, long, default_value = "USD", value_parser = parse_currency_arg)]
        currency: Currency,
    },

    /// Refresh prices periodically until interrupted
    Watch {
        /// Fiat currency: USD, EUR, or CLP
        #[arg(short, long, default_value = "USD", value_parser = parse_currency_arg)]
        currency: Currency,

        /// Seconds between refreshes
        #[arg(short, long, default_value_t = 60)]
        interval: u64,
    },

    /// Run the HTTP service
    Serve {
        /// Port to listen on (overrides CRYPTOTRACK_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Inspect or clear the local price cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print the sitemap XML for the configured base URL
    Sitemap,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cached currencies and their age
    Status {
        /// Only show this currency
        #[arg(short, long, value_parser = parse_currency_arg)]
        currency: Option<Currency>,
    },

    /// Remove cached prices
    Clear {
        /// Only clear this currency
        #[arg(short, long, value_parser = parse_currency_arg)]
        currency: Option<Currency>,
    },
}
