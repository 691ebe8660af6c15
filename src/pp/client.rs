//! Client model - the root of a ledger file.

use serde::{Deserialize, Serialize};

use super::portfolio::Portfolio;
use super::security::Security;
use super::taxonomy::Taxonomy;
use super::transaction::PortfolioTransaction;

/// Current ledger file format version
pub const CURRENT_VERSION: i32 = 1;

/// The root client object representing a complete ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// File format version
    #[serde(default = "default_version")]
    pub version: i32,
    /// Base currency (default: EUR)
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// All securities defined in the file
    #[serde(default)]
    pub securities: Vec<Security>,
    /// All portfolios (depots)
    #[serde(default)]
    pub portfolios: Vec<Portfolio>,
    /// Taxonomies for classification
    #[serde(default)]
    pub taxonomies: Vec<Taxonomy>,
}

fn default_version() -> i32 {
    CURRENT_VERSION
}

fn default_base_currency() -> String {
    "EUR".to_string()
}

/// A portfolio transaction together with the portfolio that owns it
#[derive(Debug, Clone, Copy)]
pub struct TransactionPair<'a> {
    pub owner: &'a Portfolio,
    pub transaction: &'a PortfolioTransaction,
}

impl<'a> TransactionPair<'a> {
    pub fn new(owner: &'a Portfolio, transaction: &'a PortfolioTransaction) -> Self {
        Self { owner, transaction }
    }
}

impl Client {
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            version: CURRENT_VERSION,
            base_currency: base_currency.into(),
            securities: Vec::new(),
            portfolios: Vec::new(),
            taxonomies: Vec::new(),
        }
    }

    /// Find a security by UUID
    pub fn find_security(&self, uuid: &str) -> Option<&Security> {
        self.securities.iter().find(|s| s.uuid == uuid)
    }

    /// Find a portfolio by UUID
    pub fn find_portfolio(&self, uuid: &str) -> Option<&Portfolio> {
        self.portfolios.iter().find(|p| p.uuid == uuid)
    }

    /// Find a taxonomy by id, falling back to a (case-insensitive) name match
    pub fn find_taxonomy(&self, id_or_name: &str) -> Option<&Taxonomy> {
        self.taxonomies
            .iter()
            .find(|t| t.id == id_or_name)
            .or_else(|| {
                self.taxonomies
                    .iter()
                    .find(|t| t.name.eq_ignore_ascii_case(id_or_name))
            })
    }

    /// All portfolio transactions of a security across all portfolios, in
    /// portfolio order and then booking order.
    pub fn security_transactions(&self, security_uuid: &str) -> Vec<TransactionPair<'_>> {
        self.portfolios
            .iter()
            .flat_map(|portfolio| {
                portfolio
                    .transactions_for_security(security_uuid)
                    .into_iter()
                    .map(move |tx| TransactionPair::new(portfolio, tx))
            })
            .collect()
    }

    /// Portfolio owning the transaction with the given UUID
    pub fn transaction_owner(&self, transaction_uuid: &str) -> Option<&Portfolio> {
        self.portfolios
            .iter()
            .find(|p| p.transactions.iter().any(|tx| tx.uuid == transaction_uuid))
    }

    /// Calculate total holdings across all portfolios
    pub fn total_holdings(&self) -> std::collections::HashMap<String, i64> {
        let mut total = std::collections::HashMap::new();
        for portfolio in &self.portfolios {
            for (sec_uuid, shares) in portfolio.holdings() {
                *total.entry(sec_uuid).or_insert(0) += shares;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pp::common::Money;
    use crate::pp::transaction::PortfolioTransactionType;
    use chrono::NaiveDateTime;

    fn tx(uuid: &str, security: &str) -> PortfolioTransaction {
        let mut t = PortfolioTransaction::new(
            uuid.to_string(),
            NaiveDateTime::default(),
            PortfolioTransactionType::Buy,
            Money::new(1000, "EUR"),
            100_000_000,
        );
        t.security_uuid = Some(security.to_string());
        t
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new("USD");
        assert_eq!(client.version, CURRENT_VERSION);
        assert_eq!(client.base_currency, "USD");
    }

    #[test]
    fn test_find_security() {
        let mut client = Client::new("EUR");
        client.securities.push(Security::new(
            "sec-1".to_string(),
            "Apple".to_string(),
            "USD".to_string(),
        ));

        assert!(client.find_security("sec-1").is_some());
        assert!(client.find_security("unknown").is_none());
    }

    #[test]
    fn test_find_taxonomy_by_id_or_name() {
        let mut client = Client::new("EUR");
        client
            .taxonomies
            .push(Taxonomy::new("t-1".to_string(), "Asset Classes".to_string()));

        assert!(client.find_taxonomy("t-1").is_some());
        assert!(client.find_taxonomy("asset classes").is_some());
        assert!(client.find_taxonomy("Regions").is_none());
    }

    #[test]
    fn test_security_transactions_across_portfolios() {
        let mut client = Client::new("EUR");
        let mut a = Portfolio::new("p-a".to_string(), "A".to_string());
        a.transactions.push(tx("t1", "sec-1"));
        a.transactions.push(tx("t2", "sec-2"));
        let mut b = Portfolio::new("p-b".to_string(), "B".to_string());
        b.transactions.push(tx("t3", "sec-1"));
        client.portfolios.push(a);
        client.portfolios.push(b);

        let pairs = client.security_transactions("sec-1");
        let seen: Vec<_> = pairs
            .iter()
            .map(|p| (p.owner.uuid.as_str(), p.transaction.uuid.as_str()))
            .collect();
        assert_eq!(seen, vec![("p-a", "t1"), ("p-b", "t3")]);

        assert_eq!(client.transaction_owner("t3").unwrap().uuid, "p-b");
        assert!(client.transaction_owner("t9").is_none());
    }

    #[test]
    fn test_deserialize_minimal_client() {
        let client: Client = serde_json::from_str(r#"{"baseCurrency":"USD"}"#).unwrap();
        assert_eq!(client.base_currency, "USD");
        assert_eq!(client.version, CURRENT_VERSION);
        assert!(client.portfolios.is_empty());
    }
}
