//! Security model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::common::{LatestPrice, PriceEntry};

/// A security (stock, ETF, fund, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub uuid: String,
    pub name: String,
    pub currency: String,
    /// ISIN (International Securities Identification Number)
    #[serde(default)]
    pub isin: Option<String>,
    /// Ticker symbol
    #[serde(default)]
    pub ticker: Option<String>,
    /// Historical prices, sorted by date
    #[serde(default)]
    pub prices: Vec<PriceEntry>,
    /// Latest price from the quote feed
    #[serde(default)]
    pub latest: Option<LatestPrice>,
    /// Whether the security is retired/inactive
    #[serde(default)]
    pub is_retired: bool,
    #[serde(default)]
    pub note: Option<String>,
}

impl Security {
    pub fn new(uuid: String, name: String, currency: String) -> Self {
        Self {
            uuid,
            name,
            currency,
            isin: None,
            ticker: None,
            prices: Vec::new(),
            latest: None,
            is_retired: false,
            note: None,
        }
    }

    /// Add a price entry (maintains sorted order by date)
    pub fn add_price(&mut self, entry: PriceEntry) {
        match self.prices.binary_search_by_key(&entry.date, |e| e.date) {
            Ok(pos) => self.prices[pos] = entry,
            Err(pos) => self.prices.insert(pos, entry),
        }
    }

    /// Price valid at `date`: the latest feed price if it is not older than the
    /// history, otherwise the most recent history entry on or before `date`.
    /// Before the first entry the first known price is used.
    pub fn price_at(&self, date: NaiveDate) -> Option<PriceEntry> {
        let historic = match self.prices.binary_search_by_key(&date, |e| e.date) {
            Ok(pos) => Some(&self.prices[pos]),
            Err(0) => None,
            Err(pos) => Some(&self.prices[pos - 1]),
        };

        if let Some(LatestPrice {
            date: Some(latest_date),
            value: Some(value),
        }) = &self.latest
        {
            let newer = historic.map_or(true, |h| *latest_date > h.date);
            if *latest_date <= date && newer {
                return Some(PriceEntry::new(*latest_date, *value));
            }
        }

        historic.or_else(|| self.prices.first()).cloned()
    }
}
