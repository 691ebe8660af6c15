//! Errors raised while matching transactions into trades.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::currency::CurrencyError;
use crate::pp::common::shares;

fn format_shares(value: &i64) -> f64 {
    shares::to_decimal(*value)
}

/// Inconsistent ledger data found while building trades for one security.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeError {
    #[error("No holdings of '{security}' in portfolio {portfolio} for sale on {date}")]
    NoHoldingsForSell {
        security: String,
        portfolio: String,
        date: NaiveDateTime,
    },

    #[error(
        "Missing {} shares of '{security}' in portfolio {portfolio} for sale on {date}",
        format_shares(.missing)
    )]
    MissingHoldingsForSell {
        security: String,
        portfolio: String,
        missing: i64,
        date: NaiveDateTime,
    },

    #[error("No holdings of '{security}' in portfolio {from_portfolio} for transfer to {to_portfolio} on {date}")]
    NoHoldingsForTransfer {
        security: String,
        from_portfolio: String,
        to_portfolio: String,
        date: NaiveDateTime,
    },

    #[error(
        "Missing {} shares of '{security}' in portfolio {from_portfolio} for transfer to {to_portfolio} on {date}",
        format_shares(.missing)
    )]
    MissingHoldingsForTransfer {
        security: String,
        from_portfolio: String,
        to_portfolio: String,
        missing: i64,
        date: NaiveDateTime,
    },

    #[error("Transfer {transaction} of '{security}' has no resolvable counterpart")]
    UnresolvedTransfer { security: String, transaction: String },

    #[error(transparent)]
    Currency(#[from] CurrencyError),
}
