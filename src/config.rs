//! Report settings
//!
//! Loaded from a camelCase JSON file. Every field is optional:
//!
//! ```json
//! {
//!   "termCurrency": "EUR",
//!   "valuationDate": "2025-06-30",
//!   "taxonomy": "Asset Allocation",
//!   "skipInconsistentSecurities": true,
//!   "exchangeRates": [
//!     { "base": "EUR", "term": "USD", "date": "2025-01-02", "rate": 1.035 }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::currency::{ExchangeRate, ExchangeRateTable};

const APP_DIR: &str = "portfolio-trades";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportSettings {
    /// Currency of all reported values, defaults to the client's base currency
    pub term_currency: Option<String>,
    /// Date open trades are valued at, defaults to today
    pub valuation_date: Option<NaiveDate>,
    /// Id or name of the taxonomy to group trades by
    pub taxonomy: Option<String>,
    /// Report the remaining securities when one has inconsistent holdings
    pub skip_inconsistent_securities: bool,
    pub exchange_rates: Vec<ExchangeRate>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            term_currency: None,
            valuation_date: None,
            taxonomy: None,
            skip_inconsistent_securities: true,
            exchange_rates: Vec::new(),
        }
    }
}

impl ReportSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: ReportSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings JSON {}", path.display()))?;
        Ok(settings)
    }

    /// `<config dir>/portfolio-trades/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Load `path` if given, else the default file if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("Using settings from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Valuation date for open trades
    pub fn today(&self) -> NaiveDate {
        self.valuation_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn exchange_rate_table(&self, term_currency: &str) -> ExchangeRateTable {
        ExchangeRateTable::from_rates(term_currency, &self.exchange_rates)
    }
}
