//! Trade matching and trade statistics
//!
//! Turns the portfolio transactions of a security into trades and aggregates
//! them into per-classification statistics:
//! - `collector`: FIFO lot matching (BUY/DELIVERY_INBOUND open lots,
//!   SELL/DELIVERY_OUTBOUND close them, TRANSFER_IN moves lots between
//!   portfolios, TRANSFER_OUT is ignored)
//! - `trade`: values, profit/loss, holding period and IRR of one trade
//! - `category`: weighted trades of one classification
//! - `grouped`: distribution of trades over the classifications of a taxonomy
//! - `totals`: summary figures over all trades

use chrono::NaiveDate;

use crate::currency::CurrencyConverter;
use crate::performance::IrrSolver;

pub mod category;
pub mod collector;
pub mod error;
pub mod grouped;
pub mod totals;
pub mod trade;

pub use category::{TradeAssignment, TradeCategory};
pub use collector::TradeCollector;
pub use error::TradeError;
pub use grouped::TradesGroupedByTaxonomy;
pub use totals::TradeTotals;
pub use trade::{Trade, TradeTransaction};

/// Collaborators shared by every calculation of one report run
#[derive(Clone, Copy)]
pub struct TradeContext<'a> {
    pub converter: &'a dyn CurrencyConverter,
    pub irr: &'a dyn IrrSolver,
    /// Valuation date for open trades
    pub today: NaiveDate,
}

impl<'a> TradeContext<'a> {
    pub fn new(
        converter: &'a dyn CurrencyConverter,
        irr: &'a dyn IrrSolver,
        today: NaiveDate,
    ) -> Self {
        Self {
            converter,
            irr,
            today,
        }
    }

    pub fn term_currency(&self) -> &str {
        self.converter.term_currency()
    }
}
