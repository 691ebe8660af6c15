//! Ledger data models.
//!
//! This module contains the in-memory model of a portfolio ledger: securities
//! with their price history, portfolios with their transactions, and
//! taxonomies used to classify securities.

pub mod client;
pub mod common;
pub mod portfolio;
pub mod security;
pub mod taxonomy;
pub mod transaction;

// Re-export main types for convenience
pub use client::{Client, TransactionPair, CURRENT_VERSION};
pub use common::{
    ForexInfo, LatestPrice, Money, PriceEntry, AMOUNT_FACTOR, PRICE_FACTOR, SHARES_FACTOR,
};
pub use portfolio::Portfolio;
pub use security::Security;
pub use taxonomy::{
    Classification, ClassificationAssignment, Taxonomy, TaxonomyVisitor, ONE_HUNDRED_PERCENT,
    UNASSIGNED_ID,
};
pub use transaction::{
    CrossEntry, CrossEntryType, PortfolioTransaction, PortfolioTransactionType, TransactionUnit,
    UnitType,
};
