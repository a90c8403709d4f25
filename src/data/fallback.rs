//! Built-in price snapshot
//!
//! Used when the API is unreachable or rate limited and no usable cache entry
//! exists. Prices are approximate USD values and are scaled by a fixed
//! multiplier for other currencies.

use chrono::{DateTime, Utc};

use super::{Currency, CurrencyRecord};

/// (id, symbol, name, image, price, market cap, 24h change, volume)
type FallbackRow = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    f64,
    f64,
    f64,
    f64,
);

const FALLBACK_ROWS: [FallbackRow; 10] = [
    (
        "bitcoin",
        "btc",
        "Bitcoin",
        "https://assets.coingecko.com/coins/images/1/large/bitcoin.png",
        43250.0,
        847_000_000_000.0,
        2.5,
        25_000_000_000.0,
    ),
    (
        "ethereum",
        "eth",
        "Ethereum",
        "https://assets.coingecko.com/coins/images/279/large/ethereum.png",
        2650.0,
        318_000_000_000.0,
        1.8,
        15_000_000_000.0,
    ),
    (
        "tether",
        "usdt",
        "Tether",
        "https://assets.coingecko.com/coins/images/325/large/Tether.png",
        1.0,
        95_000_000_000.0,
        0.1,
        45_000_000_000.0,
    ),
    (
        "binancecoin",
        "bnb",
        "BNB",
        "https://assets.coingecko.com/coins/images/825/large/bnb-icon2_2x.png",
        315.0,
        47_000_000_000.0,
        -0.5,
        1_200_000_000.0,
    ),
    (
        "solana",
        "sol",
        "Solana",
        "https://assets.coingecko.com/coins/images/4128/large/solana.png",
        98.0,
        43_000_000_000.0,
        3.2,
        2_800_000_000.0,
    ),
    (
        "ripple",
        "xrp",
        "XRP",
        "https://assets.coingecko.com/coins/images/44/large/xrp-symbol-white-128.png",
        0.52,
        28_000_000_000.0,
        1.1,
        1_500_000_000.0,
    ),
    (
        "usd-coin",
        "usdc",
        "USDC",
        "https://assets.coingecko.com/coins/images/6319/large/USD_Coin_icon.png",
        1.0,
        25_000_000_000.0,
        0.0,
        5_000_000_000.0,
    ),
    (
        "staked-ether",
        "steth",
        "Lido Staked Ether",
        "https://assets.coingecko.com/coins/images/13442/large/steth_logo.png",
        2645.0,
        24_000_000_000.0,
        1.7,
        85_000_000.0,
    ),
    (
        "cardano",
        "ada",
        "Cardano",
        "https://assets.coingecko.com/coins/images/975/large/cardano.png",
        0.45,
        16_000_000_000.0,
        2.8,
        450_000_000.0,
    ),
    (
        "dogecoin",
        "doge",
        "Dogecoin",
        "https://assets.coingecko.com/coins/images/5/large/dogecoin.png",
        0.085,
        12_000_000_000.0,
        4.2,
        800_000_000.0,
    ),
];

/// Returns the static snapshot in USD, stamped with `now`
pub fn fallback_prices(now: DateTime<Utc>) -> Vec<CurrencyRecord> {
    FALLBACK_ROWS
        .iter()
        .enumerate()
        .map(
            |(i, &(id, symbol, name, image, price, market_cap, change, volume))| CurrencyRecord {
                id: id.to_string(),
                symbol: symbol.to_string(),
                name: name.to_string(),
                image: image.to_string(),
                current_price: price,
                market_cap,
                market_cap_rank: Some(i as u32 + 1),
                price_change_percentage_24h: Some(change),
                total_volume: volume,
                last_updated: Some(now),
            },
        )
        .collect()
}

/// Scales USD prices and market caps into `currency`
///
/// Volume and percentage change are left untouched.
pub fn adjust_prices_for_currency(
    records: &[CurrencyRecord],
    currency: Currency,
) -> Vec<CurrencyRecord> {
    let multiplier = currency.usd_multiplier();

    records
        .iter()
        .map(|record| CurrencyRecord {
            current_price: record.current_price * multiplier,
            market_cap: record.market_cap * multiplier,
            ..record.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_has_ten_ranked_coins() {
        let records = fallback_prices(Utc::now());
        assert_eq!(records.len(), 10);

        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.market_cap_rank, Some(i as u32 + 1));
            assert!(record.current_price > 0.0, "{} has no price", record.id);
        }
        assert_eq!(records[0].id, "bitcoin");
        assert_eq!(records[9].id, "dogecoin");
    }

    #[test]
    fn test_fallback_ids_are_unique() {
        let records = fallback_prices(Utc::now());
        let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        let original_len = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), original_len, "Fallback ids are not unique");
    }

    #[test]
    fn test_eur_adjustment_scales_every_price() {
        let usd = fallback_prices(Utc::now());
        let eur = adjust_prices_for_currency(&usd, Currency::Eur);

        assert_eq!(usd.len(), eur.len());
        for (original, adjusted) in usd.iter().zip(&eur) {
            assert_eq!(adjusted.current_price, original.current_price * 0.85);
            assert_eq!(adjusted.market_cap, original.market_cap * 0.85);
            assert_eq!(adjusted.total_volume, original.total_volume);
            assert_eq!(
                adjusted.price_change_percentage_24h,
                original.price_change_percentage_24h
            );
        }
    }

    #[test]
    fn test_usd_adjustment_is_identity() {
        let usd = fallback_prices(Utc::now());
        let adjusted = adjust_prices_for_currency(&usd, Currency::Usd);
        assert_eq!(usd, adjusted);
    }

    #[test]
    fn test_clp_adjustment() {
        let usd = fallback_prices(Utc::now());
        let clp = adjust_prices_for_currency(&usd, Currency::Clp);
        assert_eq!(clp[0].current_price, 43250.0 * 850.0);
    }
}
