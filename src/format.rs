//! Number formatting for terminal output

use crate::data::{Currency, CurrencyRecord, PriceSnapshot};

/// Formats a price with the currency symbol and thousands separators
///
/// CLP has no minor unit and is shown without decimals. Other currencies show
/// at least 2 and at most 6 decimals, so sub-cent coins stay readable.
pub fn format_price(amount: f64, currency: Currency) -> String {
    let formatted = match currency {
        Currency::Clp => group_thousands(&format!("{:.0}", amount)),
        _ => {
            let raw = format!("{:.6}", amount);
            let trimmed = trim_decimals(&raw, 2);
            group_thousands(&trimmed)
        }
    };
    format!("{}{}", currency.symbol(), formatted)
}

/// Formats a percentage with two decimals, e.g. `-0.50%`
pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Formats a large amount in compact notation, e.g. `847B` or `1.23T`
pub fn format_market_cap(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];

    let decimals = if value >= 1e12 { 2 } else { 1 };
    for (scale, suffix) in UNITS {
        if value.abs() >= scale {
            let scaled = format!("{:.*}", decimals, value / scale);
            return format!("{}{}", trim_decimals(&scaled, 0), suffix);
        }
    }
    trim_decimals(&format!("{:.*}", decimals, value), 0)
}

/// Renders a snapshot as a plain text table
pub fn render_table(snapshot: &PriceSnapshot) -> String {
    let mut out = format!(
        "{:>4}  {:<24} {:<6} {:>18} {:>9} {:>10}\n",
        "#", "Name", "Symbol", "Price", "24h", "Mkt Cap"
    );
    for record in &snapshot.records {
        out.push_str(&render_row(record, snapshot.currency));
        out.push('\n');
    }
    out
}

fn render_row(record: &CurrencyRecord, currency: Currency) -> String {
    let rank = record
        .market_cap_rank
        .map_or_else(|| "-".to_string(), |r| r.to_string());
    let change = record
        .price_change_percentage_24h
        .map_or_else(|| "-".to_string(), format_percentage);

    format!(
        "{:>4}  {:<24} {:<6} {:>18} {:>9} {:>10}",
        rank,
        truncate(&record.name, 24),
        record.symbol.to_uppercase(),
        format_price(record.current_price, currency),
        change,
        format_market_cap(record.market_cap)
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max - 1).collect();
        cut.push('…');
        cut
    }
}

/// Strips trailing zeros after the decimal point, keeping at least `min` decimals
fn trim_decimals(s: &str, min: usize) -> String {
    let Some(dot) = s.find('.') else {
        return s.to_string();
    };
    let mut end = s.len();
    while end > dot + 1 + min && s.as_bytes()[end - 1] == b'0' {
        end -= 1;
    }
    if end == dot + 1 {
        end = dot;
    }
    s[..end].to_string()
}

/// Inserts `,` every three digits in the integer part
fn group_thousands(s: &str) -> String {
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (int_part, frac_part) = match rest.find('.') {
        Some(dot) => rest.split_at(dot),
        None => (rest, ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}{}", sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{fallback_prices, DataSource};
    use chrono::Utc;

    #[test]
    fn test_format_price_usd() {
        assert_eq!(format_price(43250.0, Currency::Usd), "$43,250.00");
        assert_eq!(format_price(1.0, Currency::Usd), "$1.00");
        assert_eq!(format_price(0.085, Currency::Usd), "$0.085");
        assert_eq!(format_price(0.00001234, Currency::Usd), "$0.000012");
        assert_eq!(format_price(1234567.891, Currency::Usd), "$1,234,567.891");
    }

    #[test]
    fn test_format_price_eur_and_clp() {
        assert_eq!(format_price(2252.5, Currency::Eur), "€2,252.50");
        assert_eq!(format_price(36762500.4, Currency::Clp), "$36,762,500");
        assert_eq!(format_price(72.25, Currency::Clp), "$72");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(2.5), "2.50%");
        assert_eq!(format_percentage(-0.5), "-0.50%");
        assert_eq!(format_percentage(0.0), "0.00%");
    }

    #[test]
    fn test_format_market_cap() {
        assert_eq!(format_market_cap(847_000_000_000.0), "847B");
        assert_eq!(format_market_cap(1_234_000_000_000.0), "1.23T");
        assert_eq!(format_market_cap(25_500_000.0), "25.5M");
        assert_eq!(format_market_cap(1_200.0), "1.2K");
        assert_eq!(format_market_cap(950.0), "950");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("123456.78"), "123,456.78");
        assert_eq!(group_thousands("-1234567"), "-1,234,567");
    }

    #[test]
    fn test_render_table_has_row_per_record() {
        let snapshot = PriceSnapshot {
            currency: Currency::Usd,
            records: fallback_prices(Utc::now()),
            source: DataSource::Fallback,
            as_of: Utc::now(),
        };

        let table = render_table(&snapshot);
        assert_eq!(table.lines().count(), 11);
        assert!(table.contains("Bitcoin"));
        assert!(table.contains("BTC"));
        assert!(table.contains("$43,250.00"));
    }

    #[test]
    fn test_truncate_long_names() {
        assert_eq!(truncate("Short", 10), "Short");
        assert_eq!(truncate("A very long coin name", 10), "A very lo…");
    }
}
