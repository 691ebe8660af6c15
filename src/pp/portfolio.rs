//! Portfolio model.
//!
//! Portfolios (Depots) hold securities and track buy/sell transactions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::transaction::PortfolioTransaction;

/// A securities portfolio (Depot)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub uuid: String,
    pub name: String,
    /// Reference to the linked cash account (for settlements)
    #[serde(default)]
    pub reference_account_uuid: Option<String>,
    #[serde(default)]
    pub is_retired: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub transactions: Vec<PortfolioTransaction>,
}

impl Portfolio {
    pub fn new(uuid: String, name: String) -> Self {
        Self {
            uuid,
            name,
            reference_account_uuid: None,
            is_retired: false,
            note: None,
            transactions: Vec::new(),
        }
    }

    /// Calculate holdings (security_uuid → shares)
    pub fn holdings(&self) -> HashMap<String, i64> {
        let mut holdings: HashMap<String, i64> = HashMap::new();

        for tx in &self.transactions {
            if let Some(ref sec_uuid) = tx.security_uuid {
                let entry = holdings.entry(sec_uuid.clone()).or_insert(0);
                if tx.transaction_type.is_purchase() {
                    *entry += tx.shares;
                } else {
                    *entry -= tx.shares;
                }
            }
        }

        holdings.retain(|_, &mut shares| shares > 0);
        holdings
    }

    /// Get all transactions for a specific security
    pub fn transactions_for_security(&self, security_uuid: &str) -> Vec<&PortfolioTransaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.security_uuid.as_deref() == Some(security_uuid))
            .collect()
    }
}
