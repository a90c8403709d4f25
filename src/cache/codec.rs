//! Compact encoding for cached price lists
//!
//! Records are stored with single-letter field names to keep stored entries
//! small. Decoding also accepts the full CoinGecko field names so entries
//! written without compaction still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::CurrencyRecord;

#[derive(Debug, Serialize, Deserialize)]
struct CompactRecord {
    i: String,
    s: String,
    n: String,
    img: String,
    p: f64,
    mc: f64,
    #[serde(default)]
    r: Option<u32>,
    #[serde(default)]
    c: Option<f64>,
    v: f64,
    #[serde(default)]
    u: Option<DateTime<Utc>>,
}

impl From<&CurrencyRecord> for CompactRecord {
    fn from(record: &CurrencyRecord) -> Self {
        Self {
            i: record.id.clone(),
            s: record.symbol.clone(),
            n: record.name.clone(),
            img: record.image.clone(),
            p: record.current_price,
            mc: record.market_cap,
            r: record.market_cap_rank,
            c: record.price_change_percentage_24h,
            v: record.total_volume,
            u: record.last_updated,
        }
    }
}

impl From<CompactRecord> for CurrencyRecord {
    fn from(compact: CompactRecord) -> Self {
        Self {
            id: compact.i,
            symbol: compact.s,
            name: compact.n,
            image: compact.img,
            current_price: compact.p,
            market_cap: compact.mc,
            market_cap_rank: compact.r,
            price_change_percentage_24h: compact.c,
            total_volume: compact.v,
            last_updated: compact.u,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecords {
    Compact(Vec<CompactRecord>),
    Full(Vec<CurrencyRecord>),
}

/// Encodes records in the compact form
pub fn encode(records: &[CurrencyRecord]) -> Result<String, serde_json::Error> {
    let compact: Vec<CompactRecord> = records.iter().map(CompactRecord::from).collect();
    serde_json::to_string(&compact)
}

/// Decodes records stored in either the compact or the full form
pub fn decode(raw: &str) -> Result<Vec<CurrencyRecord>, serde_json::Error> {
    // Parse once so a syntax error is reported as such, not as an untagged mismatch
    let value: serde_json::Value = serde_json::from_str(raw)?;
    match serde_json::from_value(value)? {
        StoredRecords::Compact(records) => Ok(records.into_iter().map(Into::into).collect()),
        StoredRecords::Full(records) => Ok(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fallback_prices;

    #[test]
    fn test_encode_uses_short_field_names() {
        let records = fallback_prices(Utc::now());
        let encoded = encode(&records[..1]).unwrap();

        assert!(encoded.contains("\"i\":\"bitcoin\""));
        assert!(encoded.contains("\"mc\":"));
        assert!(!encoded.contains("current_price"));
    }

    #[test]
    fn test_decode_compact_form() {
        let records = fallback_prices(Utc::now());
        let decoded = decode(&encode(&records).unwrap()).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_decode_full_form() {
        let records = fallback_prices(Utc::now());
        let full = serde_json::to_string(&records).unwrap();

        let decoded = decode(&full).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_decode_empty_array() {
        assert!(decode("[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("{ invalid json }").is_err());
        assert!(decode("{\"not\": \"an array\"}").is_err());
        assert!(decode("[{\"unexpected\": true}]").is_err());
    }
}
