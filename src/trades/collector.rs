//! Trade collection (FIFO lot matching)
//!
//! Walks all portfolio transactions of a security in chronological order:
//! - BUY/DELIVERY_INBOUND: open a new lot in the owning portfolio
//! - SELL/DELIVERY_OUTBOUND: close lots of the owning portfolio in FIFO order
//!   and create a closed trade
//! - TRANSFER_IN: move lots from the source portfolio (via cross-entry)
//! - TRANSFER_OUT: Ignored (handled by TRANSFER_IN)
//!
//! Lots that are only partially consumed are split proportionally. Whatever
//! is left open at the end becomes one open trade per portfolio.

use std::cmp::Ordering;
use std::collections::VecDeque;

use super::error::TradeError;
use super::trade::{MovingAverageCost, Trade, TradeTransaction};
use super::TradeContext;
use crate::pp::client::TransactionPair;
use crate::pp::{Client, CrossEntryType, PortfolioTransactionType, Security};

/// Open lots of one portfolio, oldest first
struct OpenPosition {
    portfolio_uuid: String,
    lots: VecDeque<TradeTransaction>,
}

/// Open positions keyed by portfolio uuid, in order of first appearance
#[derive(Default)]
struct OpenPositions {
    positions: Vec<OpenPosition>,
}

impl OpenPositions {
    fn get_mut(&mut self, portfolio_uuid: &str) -> Option<&mut VecDeque<TradeTransaction>> {
        self.positions
            .iter_mut()
            .find(|p| p.portfolio_uuid == portfolio_uuid)
            .map(|p| &mut p.lots)
    }

    fn entry(&mut self, portfolio_uuid: &str) -> &mut VecDeque<TradeTransaction> {
        let index = match self
            .positions
            .iter()
            .position(|p| p.portfolio_uuid == portfolio_uuid)
        {
            Some(index) => index,
            None => {
                self.positions.push(OpenPosition {
                    portfolio_uuid: portfolio_uuid.to_string(),
                    lots: VecDeque::new(),
                });
                self.positions.len() - 1
            }
        };
        &mut self.positions[index].lots
    }
}

/// Purchases before liquidations on the same timestamp, so that a position
/// opened and closed at the same instant can be matched
fn by_date_and_type(a: &TransactionPair<'_>, b: &TransactionPair<'_>) -> Ordering {
    a.transaction.date.cmp(&b.transaction.date).then_with(|| {
        let first = a.transaction.transaction_type.is_purchase();
        let second = b.transaction.transaction_type.is_purchase();
        second.cmp(&first)
    })
}

/// Take `shares` from the front of `lots`, splitting the last lot if needed.
/// Taken lots are re-booked in `portfolio_uuid`. Returns the taken lots and
/// the shares that could not be covered.
fn take_lots(
    lots: &mut VecDeque<TradeTransaction>,
    shares: i64,
    portfolio_uuid: &str,
) -> (Vec<TradeTransaction>, i64) {
    let mut taken = Vec::new();
    let mut remaining = shares;

    while remaining > 0 {
        let Some(candidate) = lots.front_mut() else {
            break;
        };
        let candidate_shares = candidate.shares();

        if remaining >= candidate_shares {
            if let Some(mut lot) = lots.pop_front() {
                lot.portfolio_uuid = portfolio_uuid.to_string();
                taken.push(lot);
            }
            remaining -= candidate_shares;
        } else {
            let part = candidate.split(remaining as f64 / candidate_shares as f64, portfolio_uuid);
            let rest = candidate.split(
                (candidate_shares - remaining) as f64 / candidate_shares as f64,
                &candidate.portfolio_uuid,
            );
            *candidate = rest;
            taken.push(part);
            remaining = 0;
        }
    }

    (taken, remaining)
}

/// Builds trades from the transactions of a client
pub struct TradeCollector<'a> {
    client: &'a Client,
    context: TradeContext<'a>,
}

impl<'a> TradeCollector<'a> {
    pub fn new(client: &'a Client, context: &TradeContext<'a>) -> Self {
        Self {
            client,
            context: *context,
        }
    }

    /// Collect closed and open trades of `security`. Closed trades come in
    /// the order they were closed, followed by the open trades.
    pub fn collect(&self, security: &Security) -> Result<Vec<Trade>, TradeError> {
        let mut transactions = self.client.security_transactions(&security.uuid);
        transactions.sort_by(by_date_and_type);

        let mut trades: Vec<(Trade, MovingAverageCost)> = Vec::new();
        let mut open = OpenPositions::default();
        let mut moving_average = MovingAverageCost::new(true);

        for pair in &transactions {
            let owner = pair.owner.uuid.as_str();
            let tx = pair.transaction;

            match tx.transaction_type {
                PortfolioTransactionType::Buy | PortfolioTransactionType::DeliveryInbound => {
                    open.entry(owner)
                        .push_back(TradeTransaction::new(owner, tx.clone()));
                }
                PortfolioTransactionType::Sell | PortfolioTransactionType::DeliveryOutbound => {
                    let trade = self.close_lots(security, &mut open, pair)?;
                    trades.push((trade, moving_average.clone()));
                }
                PortfolioTransactionType::TransferIn => {
                    self.move_lots(security, &mut open, pair)?;
                }
                PortfolioTransactionType::TransferOut => {
                    // Ignored - handled by TRANSFER_IN
                }
            }

            moving_average.record(tx, self.context.converter)?;
        }

        for position in open.positions {
            let Some(first) = position.lots.front() else {
                continue;
            };
            let start = first.date();
            let shares = position.lots.iter().map(|lot| lot.shares()).sum();
            let trade = Trade::new(
                security,
                position.portfolio_uuid,
                shares,
                start,
                None,
                position.lots.into_iter().collect(),
            );
            trades.push((trade, moving_average.clone()));
        }

        let mut result = Vec::with_capacity(trades.len());
        for (mut trade, average) in trades {
            trade.calculate(&self.context, security, &average)?;
            result.push(trade);
        }

        log::debug!(
            "Collected {} trades ({} open) for '{}' from {} transactions",
            result.len(),
            result.iter().filter(|t| !t.is_closed()).count(),
            security.name,
            transactions.len()
        );

        Ok(result)
    }

    /// Collect trades of all `securities`. Securities with inconsistent
    /// transactions are skipped and reported together with their error.
    pub fn collect_all(&self, securities: &[Security]) -> (Vec<Trade>, Vec<(String, TradeError)>) {
        let mut trades = Vec::new();
        let mut failures = Vec::new();

        for security in securities {
            match self.collect(security) {
                Ok(mut collected) => trades.append(&mut collected),
                Err(e) => {
                    log::error!("Skipping trades of '{}': {}", security.name, e);
                    failures.push((security.uuid.clone(), e));
                }
            }
        }

        (trades, failures)
    }

    fn close_lots(
        &self,
        security: &Security,
        open: &mut OpenPositions,
        pair: &TransactionPair<'_>,
    ) -> Result<Trade, TradeError> {
        let owner = pair.owner.uuid.as_str();
        let tx = pair.transaction;

        let lots = match open.get_mut(owner) {
            Some(lots) if !lots.is_empty() => lots,
            _ => {
                return Err(TradeError::NoHoldingsForSell {
                    security: security.name.clone(),
                    portfolio: pair.owner.name.clone(),
                    date: tx.date,
                })
            }
        };

        let (mut fragments, missing) = take_lots(lots, tx.shares, owner);
        if missing > 0 {
            return Err(TradeError::MissingHoldingsForSell {
                security: security.name.clone(),
                portfolio: pair.owner.name.clone(),
                missing,
                date: tx.date,
            });
        }

        let start = fragments.first().map(|f| f.date()).unwrap_or(tx.date);
        fragments.push(TradeTransaction::new(owner, tx.clone()));

        Ok(Trade::new(
            security,
            owner,
            tx.shares,
            start,
            Some(tx.date),
            fragments,
        ))
    }

    fn move_lots(
        &self,
        security: &Security,
        open: &mut OpenPositions,
        pair: &TransactionPair<'_>,
    ) -> Result<(), TradeError> {
        let tx = pair.transaction;
        let target = pair.owner;

        let unresolved = || TradeError::UnresolvedTransfer {
            security: security.name.clone(),
            transaction: tx.uuid.clone(),
        };

        let cross = tx
            .cross_entry
            .as_ref()
            .filter(|c| c.entry_type == CrossEntryType::PortfolioTransfer)
            .ok_or_else(unresolved)?;
        let counterpart = if cross.source_uuid == tx.uuid {
            &cross.target_uuid
        } else {
            &cross.source_uuid
        };
        let source = self
            .client
            .transaction_owner(counterpart)
            .ok_or_else(unresolved)?;

        open.entry(&target.uuid);

        let lots = match open.get_mut(&source.uuid) {
            Some(lots) if !lots.is_empty() => lots,
            _ => {
                return Err(TradeError::NoHoldingsForTransfer {
                    security: security.name.clone(),
                    from_portfolio: source.name.clone(),
                    to_portfolio: target.name.clone(),
                    date: tx.date,
                })
            }
        };

        let (moved, missing) = take_lots(lots, tx.shares, &target.uuid);
        if missing > 0 {
            return Err(TradeError::MissingHoldingsForTransfer {
                security: security.name.clone(),
                from_portfolio: source.name.clone(),
                to_portfolio: target.name.clone(),
                missing,
                date: tx.date,
            });
        }

        // keep the destination in purchase order
        let destination = open.entry(&target.uuid);
        for lot in moved {
            let index = destination.partition_point(|existing| existing.date() <= lot.date());
            destination.insert(index, lot);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::ExchangeRateTable;
    use crate::performance::NewtonRaphsonIrr;
    use crate::pp::common::Money;
    use crate::trades::testing::{date, datetime, LedgerBuilder};
    use approx::assert_relative_eq;

    const SHARE: i64 = 100_000_000;

    fn collect(client: &Client) -> Result<Vec<Trade>, TradeError> {
        let converter = ExchangeRateTable::new("EUR");
        let context = TradeContext::new(&converter, &NewtonRaphsonIrr, date(2025, 6, 1));
        let collector = TradeCollector::new(client, &context);
        collector.collect(&client.securities[0])
    }

    #[test]
    fn test_partial_sell_splits_lot() {
        let client = LedgerBuilder::new()
            .buy("p", "2024-01-01", 10.0, 10.0)
            .buy("p", "2024-02-01", 20.0, 10.0)
            .buy("p", "2024-03-01", 30.0, 10.0)
            .sell("p", "2024-04-01", 25.0, 12.0)
            .build();

        let trades = collect(&client).unwrap();
        assert_eq!(trades.len(), 2);

        let closed = &trades[0];
        assert!(closed.is_closed());
        assert_eq!(closed.shares(), 25 * SHARE);
        assert_eq!(closed.start(), datetime(2024, 1, 1));
        let lots: Vec<i64> = closed.transactions().iter().map(|t| t.shares()).collect();
        assert_eq!(lots, vec![10 * SHARE, 15 * SHARE, 25 * SHARE]);
        assert_eq!(closed.entry_value(), &Money::new(25000, "EUR"));
        assert_eq!(closed.exit_value(), &Money::new(30000, "EUR"));

        let open = &trades[1];
        assert!(!open.is_closed());
        assert_eq!(open.shares(), 35 * SHARE);
        assert_eq!(open.start(), datetime(2024, 2, 1));
        let lots: Vec<i64> = open.transactions().iter().map(|t| t.shares()).collect();
        assert_eq!(lots, vec![5 * SHARE, 30 * SHARE]);
        // split copies keep the uuid of their source transaction
        assert_eq!(
            open.transactions()[0].transaction.uuid,
            closed.transactions()[1].transaction.uuid
        );
    }

    #[test]
    fn test_split_lot_carries_fees_and_taxes() {
        let client = LedgerBuilder::new()
            .buy_with_costs("p", "2024-01-01", 10.0, 10.0, 2.0, 1.0)
            .sell("p", "2024-02-01", 5.0, 12.0)
            .build();

        let trades = collect(&client).unwrap();
        assert_eq!(trades.len(), 2);

        let closed = &trades[0];
        assert_eq!(closed.entry_value(), &Money::new(5150, "EUR"));
        assert_eq!(closed.entry_value_without_taxes_and_fees(), &Money::new(5000, "EUR"));
        assert_eq!(closed.profit_loss(), Money::new(850, "EUR"));
        assert_eq!(closed.profit_loss_without_taxes_and_fees(), Money::new(1000, "EUR"));
        assert_eq!(trades[1].entry_value(), &Money::new(5150, "EUR"));
    }

    #[test]
    fn test_multiple_buys_one_sell() {
        let client = LedgerBuilder::new()
            .buy("p", "2024-01-01", 12.0, 10.0)
            .buy("p", "2024-02-01", 5.0, 12.0)
            .buy("p", "2024-03-01", 3.0, 30.0)
            .sell("p", "2024-12-31", 18.0, 20.0)
            .price("2025-01-01", 2.0)
            .build();

        let trades = collect(&client).unwrap();
        assert_eq!(trades.len(), 2);

        let closed = &trades[0];
        assert_eq!(closed.shares(), 18 * SHARE);
        // 12 * 10 + 5 * 12 + 1 * 30 = 210, sold for 360
        assert_eq!(closed.profit_loss(), Money::new(15000, "EUR"));
        assert_relative_eq!(closed.return_value(), 150.0 / 210.0, epsilon = 1e-8);
        assert_relative_eq!(closed.irr(), 0.76018, epsilon = 1e-4);

        let open = &trades[1];
        assert_eq!(open.shares(), 2 * SHARE);
        assert_eq!(open.profit_loss(), Money::new(400 - 6000, "EUR"));
    }

    #[test]
    fn test_shares_are_conserved() {
        let client = LedgerBuilder::new()
            .buy("a", "2024-01-01", 7.0, 10.0)
            .inbound("a", "2024-01-15", 3.5, 10.0)
            .buy("b", "2024-02-01", 4.0, 11.0)
            .sell("a", "2024-03-01", 2.25, 12.0)
            .transfer("a", "b", "2024-03-15", 4.0, 12.0)
            .sell("b", "2024-04-01", 5.0, 13.0)
            .build();

        let trades = collect(&client).unwrap();

        // 7 + 3.5 + 4 shares were bought
        let opened: i64 = 1_450_000_000;
        let in_trades: i64 = trades
            .iter()
            .flat_map(|t| t.transactions())
            .filter(|t| t.is_purchase())
            .map(|t| t.shares())
            .sum();
        assert!((in_trades - opened).abs() <= 2, "{} vs {}", in_trades, opened);

        let closed: i64 = trades.iter().filter(|t| t.is_closed()).map(|t| t.shares()).sum();
        let open: i64 = trades.iter().filter(|t| !t.is_closed()).map(|t| t.shares()).sum();
        assert_eq!(closed, 725_000_000);
        assert!((closed + open - 1_450_000_000).abs() <= 2);
    }

    #[test]
    fn test_transfer_moves_lots_in_purchase_order() {
        let client = LedgerBuilder::new()
            .buy("a", "2024-01-01", 10.0, 10.0)
            .buy("b", "2024-02-01", 10.0, 20.0)
            .transfer("a", "b", "2024-03-01", 4.0, 30.0)
            .sell("b", "2024-04-01", 6.0, 40.0)
            .build();

        let trades = collect(&client).unwrap();
        assert_eq!(trades.len(), 3);

        // the transferred lot was bought first, so it is sold first
        let closed = &trades[0];
        assert_eq!(closed.portfolio_uuid(), "b");
        assert_eq!(closed.start(), datetime(2024, 1, 1));
        let lots: Vec<(&str, i64)> = closed
            .transactions()
            .iter()
            .map(|t| (t.portfolio_uuid.as_str(), t.shares()))
            .collect();
        assert_eq!(lots, vec![("b", 4 * SHARE), ("b", 2 * SHARE), ("b", 6 * SHARE)]);
        // 4 * 10 + 2 * 20
        assert_eq!(closed.entry_value(), &Money::new(8000, "EUR"));

        // open trades in order of first appearance of the portfolio
        assert_eq!(trades[1].portfolio_uuid(), "a");
        assert_eq!(trades[1].shares(), 6 * SHARE);
        assert_eq!(trades[2].portfolio_uuid(), "b");
        assert_eq!(trades[2].shares(), 8 * SHARE);
    }

    #[test]
    fn test_same_day_buy_and_sell_match() {
        // the sell is booked first but must still find the purchase
        let client = LedgerBuilder::new()
            .sell("p", "2024-05-01", 1.0, 11.0)
            .buy("p", "2024-05-01", 1.0, 10.0)
            .build();

        let trades = collect(&client).unwrap();
        assert_eq!(trades.len(), 1);
        assert!(trades[0].is_closed());
        assert_eq!(trades[0].holding_period(), 0);
    }

    #[test]
    fn test_sell_without_holdings() {
        let client = LedgerBuilder::new().sell("p", "2024-01-01", 1.0, 10.0).build();
        assert!(matches!(
            collect(&client),
            Err(TradeError::NoHoldingsForSell { .. })
        ));
    }

    #[test]
    fn test_oversized_sell() {
        let client = LedgerBuilder::new()
            .buy("p", "2024-01-01", 5.0, 10.0)
            .sell("p", "2024-02-01", 6.0, 10.0)
            .build();

        match collect(&client) {
            Err(TradeError::MissingHoldingsForSell { missing, .. }) => assert_eq!(missing, SHARE),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_sell_from_other_portfolio() {
        let client = LedgerBuilder::new()
            .buy("a", "2024-01-01", 5.0, 10.0)
            .sell("b", "2024-02-01", 1.0, 10.0)
            .build();
        assert!(matches!(
            collect(&client),
            Err(TradeError::NoHoldingsForSell { .. })
        ));
    }

    #[test]
    fn test_transfer_errors() {
        let client = LedgerBuilder::new()
            .buy("b", "2024-01-01", 5.0, 10.0)
            .transfer("a", "b", "2024-02-01", 1.0, 10.0)
            .build();
        assert!(matches!(
            collect(&client),
            Err(TradeError::NoHoldingsForTransfer { .. })
        ));

        let client = LedgerBuilder::new()
            .buy("a", "2024-01-01", 5.0, 10.0)
            .transfer("a", "b", "2024-02-01", 8.0, 10.0)
            .build();
        assert!(matches!(
            collect(&client),
            Err(TradeError::MissingHoldingsForTransfer { .. })
        ));

        let mut client = LedgerBuilder::new()
            .buy("a", "2024-01-01", 5.0, 10.0)
            .transfer("a", "b", "2024-02-01", 1.0, 10.0)
            .build();
        for portfolio in &mut client.portfolios {
            for tx in &mut portfolio.transactions {
                tx.cross_entry = None;
            }
        }
        assert!(matches!(
            collect(&client),
            Err(TradeError::UnresolvedTransfer { .. })
        ));
    }

    #[test]
    fn test_collect_is_idempotent() {
        let client = LedgerBuilder::new()
            .buy("p", "2024-01-01", 3.0, 10.0)
            .buy("p", "2024-01-10", 3.0, 11.0)
            .sell("p", "2024-02-01", 4.0, 12.0)
            .price("2024-03-01", 13.0)
            .build();

        let first = collect(&client).unwrap();
        let second = collect(&client).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.shares(), b.shares());
            assert_eq!(a.start(), b.start());
            assert_eq!(a.end(), b.end());
            assert_eq!(a.entry_value(), b.entry_value());
            assert_eq!(a.exit_value(), b.exit_value());
        }
    }

    #[test]
    fn test_moving_average_snapshot_before_sale() {
        let client = LedgerBuilder::new()
            .buy("p", "2024-01-01", 1.0, 100.0)
            .buy("p", "2024-02-01", 1.0, 200.0)
            .sell("p", "2024-03-01", 1.0, 180.0)
            .price("2024-03-01", 180.0)
            .build();

        let trades = collect(&client).unwrap();
        // FIFO entry 100, moving average 150
        assert_eq!(trades[0].entry_value(), &Money::new(10000, "EUR"));
        assert_eq!(trades[0].entry_value_moving_average(), &Money::new(15000, "EUR"));
        assert_eq!(trades[0].profit_loss_moving_average(), Money::new(3000, "EUR"));
        // the remaining share keeps the average cost
        assert_eq!(trades[1].entry_value_moving_average(), &Money::new(15000, "EUR"));
    }

    #[test]
    fn test_partial_delivery_outbound_closes_part_of_lot() {
        let client = LedgerBuilder::new()
            .buy("p", "2024-01-01", 10.0, 10.0)
            .outbound("p", "2024-02-01", 4.0, 15.0)
            .build();

        let trades = collect(&client).unwrap();
        assert_eq!(trades.len(), 2);

        let closed = &trades[0];
        assert!(closed.is_closed());
        assert_eq!(closed.shares(), 4 * SHARE);
        let lots: Vec<i64> = closed.transactions().iter().map(|t| t.shares()).collect();
        assert_eq!(lots, vec![4 * SHARE, 4 * SHARE]);
        assert_eq!(
            closed.transactions()[1].transaction.transaction_type,
            crate::pp::PortfolioTransactionType::DeliveryOutbound
        );
        assert_eq!(closed.entry_value(), &Money::new(4000, "EUR"));
        assert_eq!(closed.exit_value(), &Money::new(6000, "EUR"));

        let open = &trades[1];
        assert!(!open.is_closed());
        assert_eq!(open.shares(), 6 * SHARE);
        assert_eq!(open.start(), datetime(2024, 1, 1));
        assert_eq!(open.entry_value(), &Money::new(6000, "EUR"));
    }

    #[test]
    fn test_transfer_keeps_moving_average() {
        let client = LedgerBuilder::new()
            .buy("a", "2024-01-01", 1.0, 100.0)
            .buy("a", "2024-02-01", 1.0, 200.0)
            .transfer("a", "b", "2024-02-15", 1.0, 300.0)
            .sell("b", "2024-03-01", 1.0, 180.0)
            .price("2024-03-01", 180.0)
            .build();

        let trades = collect(&client).unwrap();
        assert_eq!(trades.len(), 2);

        // the transferred lot is the first purchase
        assert_eq!(trades[0].portfolio_uuid(), "b");
        assert_eq!(trades[0].entry_value(), &Money::new(10000, "EUR"));
        // the transfer at 300 does not enter the average of 100 and 200
        assert_eq!(trades[0].entry_value_moving_average(), &Money::new(15000, "EUR"));

        assert_eq!(trades[1].portfolio_uuid(), "a");
        assert_eq!(trades[1].entry_value(), &Money::new(20000, "EUR"));
        assert_eq!(trades[1].entry_value_moving_average(), &Money::new(15000, "EUR"));
    }

    #[test]
    fn test_collect_all_skips_inconsistent_securities() {
        let mut client = LedgerBuilder::new().buy("p", "2024-01-01", 1.0, 10.0).build();
        let mut broken = client.securities[0].clone();
        broken.uuid = "broken".to_string();
        broken.name = "Broken".to_string();
        let sell = crate::trades::testing::tx(
            "x",
            PortfolioTransactionType::Sell,
            "broken",
            "2024-01-01",
            1.0,
            10.0,
        );
        client.portfolios[0].transactions.push(sell);
        client.securities.push(broken);

        let converter = ExchangeRateTable::new("EUR");
        let context = TradeContext::new(&converter, &NewtonRaphsonIrr, date(2025, 6, 1));
        let collector = TradeCollector::new(&client, &context);
        let (trades, failures) = collector.collect_all(&client.securities);

        assert_eq!(trades.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "broken");
    }
}
