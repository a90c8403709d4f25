//! cryptotrack - Cryptocurrency prices from the command line
//!
//! Shows the top coins by market cap, keeps the last good price list per
//! currency in a local cache, and can serve prices over HTTP.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cryptotrack::cache::{FileStore, PriceCache};
use cryptotrack::cli::{CacheAction, Cli, Command};
use cryptotrack::config::Config;
use cryptotrack::data::{CoinDetail, Currency, DataSource, FetchError, MarketClient, PriceSnapshot};
use cryptotrack::format::{format_market_cap, format_percentage, format_price, render_table};
use cryptotrack::prices::PriceService;
use cryptotrack::refresh::{RefreshConfig, RefreshHandle, RefreshMessage};
use cryptotrack::server::rate_limit::RateLimiter;
use cryptotrack::server::{self, AppState};
use cryptotrack::sitemap;

/// Installs the stderr log subscriber; `RUST_LOG` takes precedence over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

/// Opens the file-backed cache, or runs without one if no directory is available
fn open_cache(cli: &Cli, config: &Config) -> Option<PriceCache> {
    let store = match cli.cache_dir.as_ref().or(config.cache_dir.as_ref()) {
        Some(dir) => Some(FileStore::with_dir(dir)),
        None => FileStore::new(),
    };

    match store {
        Some(store) => Some(PriceCache::new(Arc::new(store))),
        None => {
            warn!("no cache directory available, running without a price cache");
            None
        }
    }
}

fn print_snapshot_note(snapshot: &PriceSnapshot) {
    match snapshot.source {
        DataSource::Live => {}
        DataSource::Cache => eprintln!(
            "Live prices unavailable; showing cached prices from {}",
            snapshot.as_of.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        DataSource::Fallback => {
            eprintln!("Live prices unavailable; showing approximate offline prices")
        }
    }
}

fn print_coin(detail: &CoinDetail, currency: Currency) {
    let price = |amount: Option<f64>| {
        amount.map_or_else(|| "-".to_string(), |a| format_price(a, currency))
    };
    let market_data = &detail.market_data;

    println!("{} ({})", detail.name, detail.symbol.to_uppercase());
    if let Some(rank) = detail.market_cap_rank {
        println!("  Rank:        #{}", rank);
    }
    println!("  Price:       {}", price(detail.price_in(currency)));
    println!(
        "  24h change:  {}",
        market_data
            .price_change_percentage_24h
            .map_or_else(|| "-".to_string(), format_percentage)
    );
    println!(
        "  24h range:   {} - {}",
        price(market_data.low_24h.get(currency.api_code()).copied()),
        price(market_data.high_24h.get(currency.api_code()).copied())
    );
    println!(
        "  Market cap:  {}",
        detail
            .market_cap_in(currency)
            .map_or_else(|| "-".to_string(), format_market_cap)
    );
    println!(
        "  Volume:      {}",
        detail
            .volume_in(currency)
            .map_or_else(|| "-".to_string(), format_market_cap)
    );
    if let Some(supply) = market_data.circulating_supply {
        println!("  Circulating: {}", format_market_cap(supply));
    }
}

fn print_cache_status(cache: &PriceCache, only: Option<Currency>) {
    let currencies: Vec<Currency> = match only {
        Some(currency) => vec![currency],
        None => Currency::all().to_vec(),
    };

    for currency in currencies {
        match cache.last_updated(currency.api_code()) {
            Some(updated) => {
                let age = Utc::now() - updated;
                println!(
                    "{}: updated {}s ago ({})",
                    currency,
                    age.num_seconds(),
                    if cache.is_stale(currency.api_code()) {
                        "stale"
                    } else {
                        "fresh"
                    }
                );
            }
            None => println!("{}: never", currency),
        }
    }

    let stats = cache.stats();
    println!(
        "{} cached currencies, {} bytes",
        stats.size, stats.total_size
    );
}

async fn watch(service: Arc<PriceService>, currency: Currency, interval: u64) {
    let config = RefreshConfig {
        interval: Duration::from_secs(interval.max(1)),
        ..RefreshConfig::default()
    };
    let mut handle = RefreshHandle::spawn(service, currency, config);

    loop {
        tokio::select! {
            message = handle.recv() => match message {
                Some(RefreshMessage::RefreshStarted) => {
                    eprintln!("Refreshing {} prices...", currency);
                }
                Some(RefreshMessage::PricesUpdated(snapshot)) => {
                    println!("{}", Utc::now().format("%H:%M:%S"));
                    print_snapshot_note(&snapshot);
                    print!("{}", render_table(&snapshot));
                }
                Some(RefreshMessage::RefreshCompleted) => debug!(%currency, "refresh completed"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::from_env()?;
    let cache = open_cache(&cli, &config);
    let client = MarketClient::with_base_url(config.api_base.clone());

    match cli.command {
        Command::Prices {
            currency,
            limit,
            json,
        } => {
            let service = PriceService::new(client, cache).with_limit(limit);
            let snapshot = service.fetch_prices(currency).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot.records)?);
            } else {
                print_snapshot_note(&snapshot);
                print!("{}", render_table(&snapshot));
            }
        }
        Command::Coin { id, currency } => {
            let service = PriceService::new(client, cache);
            match service.fetch_coin(&id).await {
                Ok(detail) => print_coin(&detail, currency),
                Err(FetchError::NotFound(_)) => {
                    return Err(format!("Coin not found: {}", id).into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Watch { currency, interval } => {
            let service = Arc::new(PriceService::new(client, cache));
            watch(service, currency, interval).await;
        }
        Command::Serve { port, host } => {
            let window = chrono::Duration::try_seconds(config.rate_window_secs)
                .ok_or("rate limit window out of range")?;
            let limiter = RateLimiter::new(config.rate_limit, window);
            let state = AppState {
                prices: Arc::new(PriceService::new(client, cache)),
                limiter: Arc::new(limiter),
                base_url: config.base_url.clone(),
            };
            let addr = format!("{}:{}", host, port.unwrap_or(config.port));
            server::serve(state, &addr).await?;
        }
        Command::Cache { action } => {
            let Some(cache) = cache else {
                return Err("no cache directory available".into());
            };
            match action {
                CacheAction::Status { currency } => print_cache_status(&cache, currency),
                CacheAction::Clear { currency: Some(currency) } => {
                    cache.clear(currency.api_code());
                    println!("Cleared cached {} prices", currency);
                }
                CacheAction::Clear { currency: None } => {
                    cache.clear_all();
                    println!("Cleared all cached prices");
                }
            }
        }
        Command::Sitemap => {
            print!(
                "{}",
                sitemap::render_xml(&sitemap::entries(&config.base_url, Utc::now()))
            );
        }
    }

    Ok(())
}
