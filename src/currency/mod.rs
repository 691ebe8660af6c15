//! Currency conversion module
//!
//! Provides currency conversion with:
//! - Historical rate lookup from an in-memory rate table
//! - Forward-fill for missing dates (weekend/holiday)
//! - Inverse rates when only the opposite pair is known
//! - Cross-rate triangulation through EUR

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::pp::common::{round_half_up, Money};

/// Currency used for cross-rate triangulation
pub const TRIANGULATION_CURRENCY: &str = "EUR";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurrencyError {
    #[error("No exchange rate found for {base}/{term} on {date} or before")]
    NoRate {
        base: String,
        term: String,
        date: NaiveDate,
    },
}

/// Converts monetary amounts into a fixed term currency.
pub trait CurrencyConverter {
    /// Currency every converted amount is expressed in
    fn term_currency(&self) -> &str;

    /// Convert `amount` into the term currency using the rate valid at `date`
    fn convert(&self, date: NaiveDate, amount: &Money) -> Result<Money, CurrencyError>;
}

/// A single exchange rate observation: 1 `base` = `rate` `term`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub base: String,
    pub term: String,
    pub date: NaiveDate,
    pub rate: f64,
}

/// In-memory exchange rate history converting into one term currency
#[derive(Debug, Clone)]
pub struct ExchangeRateTable {
    term_currency: String,
    /// (base, term) -> observations sorted by date
    rates: HashMap<(String, String), Vec<(NaiveDate, f64)>>,
}

impl ExchangeRateTable {
    pub fn new(term_currency: impl Into<String>) -> Self {
        Self {
            term_currency: term_currency.into(),
            rates: HashMap::new(),
        }
    }

    /// Build a table from a list of observations
    pub fn from_rates<'a>(
        term_currency: impl Into<String>,
        rates: impl IntoIterator<Item = &'a ExchangeRate>,
    ) -> Self {
        let mut table = Self::new(term_currency);
        for r in rates {
            table.add_rate(&r.base, &r.term, r.date, r.rate);
        }
        table
    }

    /// Store a rate (replaces an existing observation for the same date)
    pub fn add_rate(&mut self, base: &str, term: &str, date: NaiveDate, rate: f64) {
        let series = self
            .rates
            .entry((base.to_string(), term.to_string()))
            .or_default();
        match series.binary_search_by_key(&date, |(d, _)| *d) {
            Ok(pos) => series[pos] = (date, rate),
            Err(pos) => series.insert(pos, (date, rate)),
        }
    }

    /// Get exchange rate for a currency pair on a specific date
    /// Uses forward-fill: if no rate on date, uses most recent rate before
    pub fn get_exchange_rate(
        &self,
        base: &str,
        term: &str,
        date: NaiveDate,
    ) -> Result<f64, CurrencyError> {
        if base == term {
            return Ok(1.0);
        }

        // Try direct rate first
        if let Some(rate) = self.lookup_rate(base, term, date) {
            return Ok(rate);
        }

        // Try inverse rate
        if let Some(rate) = self.lookup_rate(term, base, date) {
            if rate != 0.0 {
                return Ok(1.0 / rate);
            }
        }

        // Triangulate through EUR
        if base != TRIANGULATION_CURRENCY && term != TRIANGULATION_CURRENCY {
            let base_to_eur = self.get_exchange_rate(base, TRIANGULATION_CURRENCY, date);
            let eur_to_term = self.get_exchange_rate(TRIANGULATION_CURRENCY, term, date);
            if let (Ok(a), Ok(b)) = (base_to_eur, eur_to_term) {
                return Ok(a * b);
            }
        }

        Err(CurrencyError::NoRate {
            base: base.to_string(),
            term: term.to_string(),
            date,
        })
    }

    /// Most recent rate on or before `date`
    fn lookup_rate(&self, base: &str, term: &str, date: NaiveDate) -> Option<f64> {
        let series = self.rates.get(&(base.to_string(), term.to_string()))?;
        match series.binary_search_by_key(&date, |(d, _)| *d) {
            Ok(pos) => Some(series[pos].1),
            Err(0) => None,
            Err(pos) => Some(series[pos - 1].1),
        }
    }
}

impl CurrencyConverter for ExchangeRateTable {
    fn term_currency(&self) -> &str {
        &self.term_currency
    }

    fn convert(&self, date: NaiveDate, amount: &Money) -> Result<Money, CurrencyError> {
        if amount.currency == self.term_currency {
            return Ok(amount.clone());
        }

        let rate = self.get_exchange_rate(&amount.currency, &self.term_currency, date)?;
        Ok(Money::new(
            round_half_up(amount.amount as f64 * rate),
            self.term_currency.clone(),
        ))
    }
}
