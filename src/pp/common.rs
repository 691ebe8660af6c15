//! Common types shared across the ledger model.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// =============================================================================
// Date parsing
// =============================================================================

/// Parse a timestamp in one of several formats (midnight for date-only input)
///
/// Supported formats:
/// - "YYYY-MM-DD" (e.g., "2024-01-15")
/// - "YYYY-MM-DD HH:MM:SS" (e.g., "2024-01-15 00:00:00")
/// - "YYYY-MM-DDTHH:MM:SS" (ISO8601, e.g., "2024-01-15T00:00:00")
pub fn parse_datetime_flexible(date_str: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .or_else(|| NaiveDateTime::parse_from_str(date_str, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S").ok())
}

// =============================================================================
// Fixed-point scales
// =============================================================================

/// Factor for converting shares (shares are stored * 10^8)
pub const SHARES_FACTOR: i64 = 100_000_000;

/// Factor for converting amounts (amounts are stored in cents)
pub const AMOUNT_FACTOR: i64 = 100;

/// Factor for converting prices (prices are stored * 10^8)
pub const PRICE_FACTOR: i64 = 100_000_000;

/// Round half-up (`floor(x + 0.5)`), the rounding used for lot splits and weighted amounts.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Round half-down (`ceil(x - 0.5)`), used for moving-average cost shares.
pub fn round_half_down(value: f64) -> i64 {
    (value - 0.5).ceil() as i64
}

/// Monetary amount with currency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    /// Amount in smallest currency units (e.g., cents for EUR)
    pub amount: i64,
    /// ISO 4217 currency code (e.g., "EUR", "USD")
    pub currency: String,
}

impl Money {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// Create a zero-value Money in the given currency
    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            amount: 0,
            currency: currency.into(),
        }
    }

    /// Convert to decimal representation (e.g., cents to euros)
    pub fn to_decimal(&self) -> f64 {
        self.amount as f64 / AMOUNT_FACTOR as f64
    }

    /// Create from decimal representation
    pub fn from_decimal(value: f64, currency: impl Into<String>) -> Self {
        Self {
            amount: round_half_up(value * AMOUNT_FACTOR as f64),
            currency: currency.into(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// Scale by `weight`, rounding half-up to the minor unit
    pub fn multiply_and_round(&self, weight: f64) -> Money {
        Money {
            amount: round_half_up(self.amount as f64 * weight),
            currency: self.currency.clone(),
        }
    }

    /// Sum amounts into `currency`. Items in any other currency are a caller bug and are skipped
    /// with a warning.
    pub fn sum<'a>(currency: &str, items: impl IntoIterator<Item = &'a Money>) -> Money {
        let mut total = 0;
        for m in items {
            if m.currency != currency {
                log::warn!(
                    "Money::sum: skipping {} {} (expected {})",
                    m.amount,
                    m.currency,
                    currency
                );
                continue;
            }
            total += m.amount;
        }
        Money::new(total, currency)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self {
            amount: 0,
            currency: "EUR".to_string(),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.to_decimal())
    }
}

/// Forex conversion information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForexInfo {
    /// Amount in foreign currency (smallest units)
    pub amount: Money,
    /// Exchange rate used for conversion
    pub exchange_rate: f64,
}

impl ForexInfo {
    pub fn new(amount: Money, exchange_rate: f64) -> Self {
        Self {
            amount,
            exchange_rate,
        }
    }
}

/// Price entry for a security at a specific date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    pub date: NaiveDate,
    /// Price in smallest currency units * 10^8
    pub value: i64,
}

impl PriceEntry {
    pub fn new(date: NaiveDate, value: i64) -> Self {
        Self { date, value }
    }

    /// Convert price value to decimal (e.g., 22552500000 → 225.525)
    pub fn to_decimal(&self) -> f64 {
        self.value as f64 / PRICE_FACTOR as f64
    }

    /// Create from decimal price
    pub fn from_decimal(date: NaiveDate, price: f64) -> Self {
        Self {
            date,
            value: round_half_up(price * PRICE_FACTOR as f64),
        }
    }
}

/// Latest price reported by a quote feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPrice {
    pub date: Option<NaiveDate>,
    /// Price in smallest currency units * 10^8
    pub value: Option<i64>,
}

/// Helper functions for share conversions
pub mod shares {
    use super::SHARES_FACTOR;

    /// Convert from internal format (shares * 10^8) to decimal
    pub fn to_decimal(shares: i64) -> f64 {
        shares as f64 / SHARES_FACTOR as f64
    }

    /// Convert from decimal to internal format (shares * 10^8)
    pub fn from_decimal(shares: f64) -> i64 {
        super::round_half_up(shares * SHARES_FACTOR as f64)
    }
}

/// Helper functions for price conversions
pub mod prices {
    use super::{AMOUNT_FACTOR, PRICE_FACTOR, SHARES_FACTOR};

    /// Convert from decimal to internal format (price * 10^8)
    pub fn from_decimal(price: f64) -> i64 {
        super::round_half_up(price * PRICE_FACTOR as f64)
    }

    /// Market value in minor currency units of `shares` (10^8 scale) at `price` (10^8 scale),
    /// rounded half-up
    pub fn market_value(shares: i64, price: i64) -> i64 {
        let divider = SHARES_FACTOR as i128 * (PRICE_FACTOR / AMOUNT_FACTOR) as i128;
        let product = shares as i128 * price as i128;
        let rounded = (product * 2 + divider).div_euclid(divider * 2);
        rounded as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_money_operations() {
        let m1 = Money::new(10000, "EUR"); // 100.00 EUR
        assert_eq!(m1.to_decimal(), 100.0);

        let m2 = Money::from_decimal(50.0, "EUR");
        assert_eq!(m2.amount, 5000);
        assert!(Money::new(-1, "EUR").is_negative());
        assert!(Money::zero("USD").is_zero());
        assert_eq!(m1.to_string(), "EUR 100.00");
    }

    #[test]
    fn test_multiply_and_round_half_up() {
        assert_eq!(Money::new(5, "EUR").multiply_and_round(0.5).amount, 3);
        // half-up rounds towards positive infinity, also for losses
        assert_eq!(Money::new(-5, "EUR").multiply_and_round(0.5).amount, -2);
        assert_eq!(Money::new(1000, "EUR").multiply_and_round(1.0 / 3.0).amount, 333);
    }

    #[test]
    fn test_money_sum_skips_foreign_currency() {
        let items = vec![Money::new(100, "EUR"), Money::new(50, "USD"), Money::new(25, "EUR")];
        assert_eq!(Money::sum("EUR", &items), Money::new(125, "EUR"));
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_down(2.5), 2);
        assert_eq!(round_half_down(2.51), 3);
    }

    #[test]
    fn test_price_conversion() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let price = PriceEntry::from_decimal(date, 225.525);
        assert_eq!(price.value, 22552500000);
        assert!((price.to_decimal() - 225.525).abs() < 0.0001);
    }

    #[test]
    fn test_market_value() {
        // 2.5 shares at 210.00 = 525.00
        assert_eq!(prices::market_value(250_000_000, prices::from_decimal(210.0)), 52500);
        // 1/3 share at 1.00 = 0.333.. -> 33 cents
        assert_eq!(prices::market_value(33_333_333, prices::from_decimal(1.0)), 33);
    }

    #[test]
    fn test_shares_conversion() {
        assert_eq!(shares::to_decimal(150_000_000), 1.5);
        assert_eq!(shares::from_decimal(2.5), 250_000_000);
    }

    #[test]
    fn test_parse_datetime_flexible() {
        let midnight = parse_datetime_flexible("2024-01-15").unwrap();
        assert_eq!(midnight.year(), 2024);
        assert_eq!(midnight.format("%H:%M").to_string(), "00:00");
        assert_eq!(
            parse_datetime_flexible("2024-01-15 10:30:00"),
            parse_datetime_flexible("2024-01-15T10:30:00")
        );
        assert!(parse_datetime_flexible("15.01.2024").is_none());

        let dt = parse_datetime_flexible("2024-01-15T10:30:00").unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "10:30");
    }
}
