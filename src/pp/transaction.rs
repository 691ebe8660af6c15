//! Portfolio transaction types.
//!
//! Only portfolio (security) transactions take part in trade matching; cash
//! account bookings are outside of this crate.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::common::{round_half_up, ForexInfo, Money};

/// Unit type for transaction components (fees, taxes, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    /// Broker/transaction fee
    Fee,
    /// Tax amount
    Tax,
    /// Gross transaction value (before fees/taxes)
    GrossValue,
}

/// A single unit (component) of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUnit {
    pub unit_type: UnitType,
    pub amount: Money,
    /// Forex information if the unit was in a different currency
    #[serde(default)]
    pub forex: Option<ForexInfo>,
}

impl TransactionUnit {
    pub fn new(unit_type: UnitType, amount: Money) -> Self {
        Self {
            unit_type,
            amount,
            forex: None,
        }
    }

    pub fn with_forex(mut self, forex: ForexInfo) -> Self {
        self.forex = Some(forex);
        self
    }

    pub fn fee(amount: Money) -> Self {
        Self::new(UnitType::Fee, amount)
    }

    pub fn tax(amount: Money) -> Self {
        Self::new(UnitType::Tax, amount)
    }

    /// Scale amount and forex amount by `weight`. The exchange rate is kept as is.
    pub fn split(&self, weight: f64) -> Self {
        Self {
            unit_type: self.unit_type,
            amount: self.amount.multiply_and_round(weight),
            forex: self.forex.as_ref().map(|fx| ForexInfo {
                amount: fx.amount.multiply_and_round(weight),
                exchange_rate: fx.exchange_rate,
            }),
        }
    }
}

/// Cross-entry type for linked transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossEntryType {
    /// Transfer between portfolios
    PortfolioTransfer,
    /// Buy/sell pair (portfolio transaction + account transaction)
    BuySell,
}

/// Cross-entry linking two related transactions by uuid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossEntry {
    pub entry_type: CrossEntryType,
    /// UUID of the source transaction (TRANSFER_OUT for portfolio transfers)
    pub source_uuid: String,
    /// UUID of the target transaction (TRANSFER_IN for portfolio transfers)
    pub target_uuid: String,
}

impl CrossEntry {
    pub fn portfolio_transfer(source_uuid: String, target_uuid: String) -> Self {
        Self {
            entry_type: CrossEntryType::PortfolioTransfer,
            source_uuid,
            target_uuid,
        }
    }
}

/// Portfolio transaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortfolioTransactionType {
    /// Purchase of securities
    Buy,
    /// Sale of securities
    Sell,
    /// Transfer in from another portfolio
    TransferIn,
    /// Transfer out to another portfolio
    TransferOut,
    /// Delivery inbound (non-cash inflow)
    DeliveryInbound,
    /// Delivery outbound (non-cash outflow)
    DeliveryOutbound,
}

impl PortfolioTransactionType {
    /// Is this a purchase (shares coming in)?
    pub fn is_purchase(&self) -> bool {
        matches!(self, Self::Buy | Self::TransferIn | Self::DeliveryInbound)
    }
}

/// Portfolio transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTransaction {
    pub uuid: String,
    pub date: NaiveDateTime,
    pub transaction_type: PortfolioTransactionType,
    /// Total amount incl. fees and taxes (purchases) or net proceeds (sales)
    pub amount: Money,
    /// Number of shares - stored as shares * 10^8
    pub shares: i64,
    /// Reference to security
    #[serde(default)]
    pub security_uuid: Option<String>,
    /// Transaction units (fees, taxes, forex)
    #[serde(default)]
    pub units: Vec<TransactionUnit>,
    /// Cross-entry for linked transactions
    #[serde(default)]
    pub cross_entry: Option<CrossEntry>,
    /// User note
    #[serde(default)]
    pub note: Option<String>,
}

impl PortfolioTransaction {
    pub fn new(
        uuid: String,
        date: NaiveDateTime,
        transaction_type: PortfolioTransactionType,
        amount: Money,
        shares: i64,
    ) -> Self {
        Self {
            uuid,
            date,
            transaction_type,
            amount,
            shares,
            security_uuid: None,
            units: Vec::new(),
            cross_entry: None,
            note: None,
        }
    }

    /// Calculate total fees from units
    pub fn total_fees(&self) -> i64 {
        self.units
            .iter()
            .filter(|u| u.unit_type == UnitType::Fee)
            .map(|u| u.amount.amount)
            .sum()
    }

    /// Calculate total taxes from units
    pub fn total_taxes(&self) -> i64 {
        self.units
            .iter()
            .filter(|u| u.unit_type == UnitType::Tax)
            .map(|u| u.amount.amount)
            .sum()
    }

    /// Value without fees and taxes: purchases paid `amount` including them,
    /// sales received `amount` after they were deducted.
    pub fn gross_value(&self) -> Money {
        let taxes_and_fees = self.total_fees() + self.total_taxes();
        let amount = if self.transaction_type.is_purchase() {
            self.amount.amount - taxes_and_fees
        } else {
            self.amount.amount + taxes_and_fees
        };
        Money::new(amount, self.amount.currency.clone())
    }

    /// Proportional copy with `round(shares * weight)` shares and every monetary
    /// value scaled by the same weight. The copy keeps the uuid of its source
    /// transaction.
    pub fn split(&self, weight: f64) -> Self {
        Self {
            uuid: self.uuid.clone(),
            date: self.date,
            transaction_type: self.transaction_type,
            amount: self.amount.multiply_and_round(weight),
            shares: round_half_up(self.shares as f64 * weight),
            security_uuid: self.security_uuid.clone(),
            units: self.units.iter().map(|u| u.split(weight)).collect(),
            cross_entry: self.cross_entry.clone(),
            note: self.note.clone(),
        }
    }
}
