//! A single trade: one open or closed position in one security.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::VecDeque;

use super::error::TradeError;
use super::TradeContext;
use crate::currency::CurrencyConverter;
use crate::pp::common::{prices, round_half_down, round_half_up, Money, AMOUNT_FACTOR};
use crate::pp::{PortfolioTransaction, PortfolioTransactionType, Security};

/// A (possibly split) transaction contributing to a trade, with the portfolio
/// it is booked in
#[derive(Debug, Clone, PartialEq)]
pub struct TradeTransaction {
    pub portfolio_uuid: String,
    pub transaction: PortfolioTransaction,
}

impl TradeTransaction {
    pub fn new(portfolio_uuid: impl Into<String>, transaction: PortfolioTransaction) -> Self {
        Self {
            portfolio_uuid: portfolio_uuid.into(),
            transaction,
        }
    }

    pub fn date(&self) -> NaiveDateTime {
        self.transaction.date
    }

    pub fn shares(&self) -> i64 {
        self.transaction.shares
    }

    pub fn is_purchase(&self) -> bool {
        self.transaction.transaction_type.is_purchase()
    }

    /// Proportional part of this transaction, booked in `portfolio_uuid`
    pub(crate) fn split(&self, weight: f64, portfolio_uuid: &str) -> Self {
        Self::new(portfolio_uuid, self.transaction.split(weight))
    }
}

/// Running moving-average cost basis of a security across all portfolios.
///
/// Transactions in the tracked direction add their shares and converted cost;
/// transactions in the opposite direction reduce the cost in proportion to
/// the shares removed. Transfers don't change the position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MovingAverageCost {
    is_long: bool,
    held_shares: i64,
    cost: i64,
    net_cost: i64,
}

impl MovingAverageCost {
    pub(crate) fn new(is_long: bool) -> Self {
        Self {
            is_long,
            held_shares: 0,
            cost: 0,
            net_cost: 0,
        }
    }

    pub(crate) fn record(
        &mut self,
        tx: &PortfolioTransaction,
        converter: &dyn CurrencyConverter,
    ) -> Result<(), TradeError> {
        match tx.transaction_type {
            PortfolioTransactionType::TransferIn | PortfolioTransactionType::TransferOut => {}
            kind if kind.is_purchase() == self.is_long => {
                let at = tx.date.date();
                self.cost += converter.convert(at, &tx.amount)?.amount;
                self.net_cost += converter.convert(at, &tx.gross_value())?.amount;
                self.held_shares += tx.shares;
            }
            _ => {
                let remaining = self.held_shares - tx.shares;
                if remaining <= 0 {
                    self.cost = 0;
                    self.net_cost = 0;
                    self.held_shares = 0;
                } else {
                    let factor = remaining as f64 / self.held_shares as f64;
                    self.cost = round_half_up(self.cost as f64 * factor);
                    self.net_cost = round_half_up(self.net_cost as f64 * factor);
                    self.held_shares = remaining;
                }
            }
        }
        Ok(())
    }

    /// Cost (with and without taxes and fees) attributable to `shares`
    fn cost_of(&self, shares: i64, currency: &str) -> (Money, Money) {
        if self.held_shares <= 0 {
            return (Money::zero(currency), Money::zero(currency));
        }

        let ratio = shares as f64 / self.held_shares as f64;
        (
            Money::new(round_half_down(ratio * self.cost as f64), currency),
            Money::new(round_half_down(ratio * self.net_cost as f64), currency),
        )
    }
}

struct CollateralLot {
    shares: i64,
    amount: f64,
}

/// Release collateral for `shares_to_cover` shares, oldest lots first
fn release_collateral(lots: &mut VecDeque<CollateralLot>, shares_to_cover: i64) -> f64 {
    let mut released = 0.0;
    let mut remaining = shares_to_cover;

    while remaining > 0 {
        let Some(lot) = lots.front_mut() else {
            break;
        };

        if remaining >= lot.shares {
            released += lot.amount;
            remaining -= lot.shares;
            lots.pop_front();
        } else {
            let partial = lot.amount * (remaining as f64 / lot.shares as f64);
            released += partial;
            lot.amount -= partial;
            lot.shares -= remaining;
            remaining = 0;
        }
    }

    released
}

/// Difference of two amounts in the same (term) currency
fn difference(minuend: &Money, subtrahend: &Money) -> Money {
    Money::new(minuend.amount - subtrahend.amount, minuend.currency.clone())
}

/// Matched position in a single security.
///
/// Values are computed once when the collector creates the trade and are in
/// the term currency of the [`TradeContext`] used.
#[derive(Debug, Clone)]
pub struct Trade {
    security_uuid: String,
    security_name: String,
    portfolio_uuid: String,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    shares: i64,
    transactions: Vec<TradeTransaction>,

    entry_value: Money,
    entry_value_without_taxes_and_fees: Money,
    exit_value: Money,
    exit_value_without_taxes_and_fees: Money,
    entry_value_moving_average: Money,
    entry_value_moving_average_without_taxes_and_fees: Money,
    holding_period: i64,
    irr: f64,
}

impl Trade {
    pub(crate) fn new(
        security: &Security,
        portfolio_uuid: impl Into<String>,
        shares: i64,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        transactions: Vec<TradeTransaction>,
    ) -> Self {
        Self {
            security_uuid: security.uuid.clone(),
            security_name: security.name.clone(),
            portfolio_uuid: portfolio_uuid.into(),
            start,
            end,
            shares,
            transactions,
            entry_value: Money::default(),
            entry_value_without_taxes_and_fees: Money::default(),
            exit_value: Money::default(),
            exit_value_without_taxes_and_fees: Money::default(),
            entry_value_moving_average: Money::default(),
            entry_value_moving_average_without_taxes_and_fees: Money::default(),
            holding_period: 0,
            irr: 0.0,
        }
    }

    /// Compute all values. `moving_average` is the cost basis of the
    /// security just before the closing transaction (or after all
    /// transactions for open trades).
    pub(crate) fn calculate(
        &mut self,
        context: &TradeContext<'_>,
        security: &Security,
        moving_average: &MovingAverageCost,
    ) -> Result<(), TradeError> {
        let converter = context.converter;
        let term = converter.term_currency().to_string();

        // transfers may have mixed up the order of the lots
        self.transactions.sort_by_key(|t| t.date());
        if let Some(first) = self.transactions.first() {
            self.start = first.date();
        }

        let is_long = self.is_long();
        let mut entry = Vec::new();
        let mut entry_gross = Vec::new();
        let mut exit = Vec::new();
        let mut exit_gross = Vec::new();

        for t in &self.transactions {
            let at = t.date().date();
            let amount = converter.convert(at, &t.transaction.amount)?;
            let gross = converter.convert(at, &t.transaction.gross_value())?;
            if t.is_purchase() == is_long {
                entry.push(amount);
                entry_gross.push(gross);
            } else {
                exit.push(amount);
                exit_gross.push(gross);
            }
        }

        self.entry_value = Money::sum(&term, &entry);
        self.entry_value_without_taxes_and_fees = Money::sum(&term, &entry_gross);

        if self.end.is_some() {
            self.exit_value = Money::sum(&term, &exit);
            self.exit_value_without_taxes_and_fees = Money::sum(&term, &exit_gross);
        } else {
            let market_value = match security.price_at(context.today) {
                Some(price) => prices::market_value(self.shares, price.value),
                None => {
                    log::warn!(
                        "No price for '{}' on {}, valuing open trade at zero",
                        security.name,
                        context.today
                    );
                    0
                }
            };
            let value = Money::new(market_value, security.currency.clone());
            self.exit_value = converter.convert(context.today, &value)?;
            self.exit_value_without_taxes_and_fees = self.exit_value.clone();
        }

        let until = self.end.map(|e| e.date()).unwrap_or(context.today);
        self.holding_period = (until - self.start.date()).num_days();

        let (cost, net_cost) = moving_average.cost_of(self.shares, &term);
        self.entry_value_moving_average = cost;
        self.entry_value_moving_average_without_taxes_and_fees = net_cost;

        let flows = self.cash_flows(1.0, converter, context.today)?;
        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = flows.into_iter().unzip();
        let irr = context.irr.calculate(&dates, &values);
        self.irr = if irr.is_finite() { irr } else { 0.0 };

        Ok(())
    }

    /// Dated cash flows of this trade scaled by `weight` (negative = paid).
    ///
    /// Short positions deposit the sale proceeds as collateral. Covering
    /// releases collateral oldest first and the total collateral is paid back
    /// at the end of the trade.
    pub(crate) fn cash_flows(
        &self,
        weight: f64,
        converter: &dyn CurrencyConverter,
        today: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, TradeError> {
        let is_long = self.is_long();
        let mut flows = Vec::with_capacity(self.transactions.len() + 2);

        let mut lots = VecDeque::new();
        let mut total_collateral = 0.0;
        let mut remaining_collateral = 0.0;

        for t in &self.transactions {
            let at = t.date().date();
            let mut amount = converter.convert(at, &t.transaction.amount)?.amount as f64
                / AMOUNT_FACTOR as f64
                * weight;

            if t.is_purchase() == is_long {
                if !is_long {
                    lots.push_back(CollateralLot {
                        shares: t.shares(),
                        amount,
                    });
                    total_collateral += amount;
                    remaining_collateral += amount;
                }
                amount = -amount;
            } else if !is_long {
                let released = release_collateral(&mut lots, t.shares());
                remaining_collateral = f64::max(0.0, remaining_collateral - released);
                amount = released - amount;
            }

            flows.push((at, amount));
        }

        if self.end.is_none() {
            let mut amount = converter.convert(today, &self.exit_value)?.amount as f64
                / AMOUNT_FACTOR as f64
                * weight;
            if !is_long {
                amount = remaining_collateral - amount;
            }
            flows.push((today, amount));
        }

        if !is_long {
            let end = self.end.map(|e| e.date()).unwrap_or(today);
            flows.push((end, total_collateral));
        }

        Ok(flows)
    }

    pub fn security_uuid(&self) -> &str {
        &self.security_uuid
    }

    pub fn security_name(&self) -> &str {
        &self.security_name
    }

    /// Portfolio the trade was closed in (or is held in, if open)
    pub fn portfolio_uuid(&self) -> &str {
        &self.portfolio_uuid
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.end
    }

    /// End date, or `today` for open trades
    pub fn end_or(&self, today: NaiveDate) -> NaiveDate {
        self.end.map(|e| e.date()).unwrap_or(today)
    }

    pub fn shares(&self) -> i64 {
        self.shares
    }

    pub fn transactions(&self) -> &[TradeTransaction] {
        &self.transactions
    }

    pub fn is_closed(&self) -> bool {
        self.end.is_some()
    }

    /// A trade is long if it was opened by a purchase
    pub fn is_long(&self) -> bool {
        self.transactions.first().map_or(true, |t| t.is_purchase())
    }

    pub fn is_short(&self) -> bool {
        !self.is_long()
    }

    /// The transaction that closed the trade
    pub fn closing_transaction(&self) -> Option<&TradeTransaction> {
        if self.is_closed() {
            self.transactions.last()
        } else {
            None
        }
    }

    pub fn last_transaction(&self) -> Option<&TradeTransaction> {
        self.transactions.last()
    }

    /// Amount paid to open the position, including taxes and fees
    pub fn entry_value(&self) -> &Money {
        &self.entry_value
    }

    pub fn entry_value_without_taxes_and_fees(&self) -> &Money {
        &self.entry_value_without_taxes_and_fees
    }

    /// Proceeds after taxes and fees, or the market value if still open
    pub fn exit_value(&self) -> &Money {
        &self.exit_value
    }

    pub fn exit_value_without_taxes_and_fees(&self) -> &Money {
        &self.exit_value_without_taxes_and_fees
    }

    pub fn entry_value_moving_average(&self) -> &Money {
        &self.entry_value_moving_average
    }

    pub fn entry_value_moving_average_without_taxes_and_fees(&self) -> &Money {
        &self.entry_value_moving_average_without_taxes_and_fees
    }

    pub fn profit_loss(&self) -> Money {
        if self.is_long() {
            difference(&self.exit_value, &self.entry_value)
        } else {
            difference(&self.entry_value, &self.exit_value)
        }
    }

    pub fn profit_loss_without_taxes_and_fees(&self) -> Money {
        if self.is_long() {
            difference(
                &self.exit_value_without_taxes_and_fees,
                &self.entry_value_without_taxes_and_fees,
            )
        } else {
            difference(
                &self.entry_value_without_taxes_and_fees,
                &self.exit_value_without_taxes_and_fees,
            )
        }
    }

    /// Exit value minus moving-average entry value, for long and short trades
    pub fn profit_loss_moving_average(&self) -> Money {
        difference(&self.exit_value, &self.entry_value_moving_average)
    }

    pub fn profit_loss_moving_average_without_taxes_and_fees(&self) -> Money {
        difference(
            &self.exit_value_without_taxes_and_fees,
            &self.entry_value_moving_average_without_taxes_and_fees,
        )
    }

    /// Return on the entry value (0 if nothing was paid)
    pub fn return_value(&self) -> f64 {
        Self::relative(self.is_long(), &self.exit_value, &self.entry_value)
    }

    /// exit / moving-average entry - 1, for long and short trades
    pub fn return_moving_average(&self) -> f64 {
        Self::relative(true, &self.exit_value, &self.entry_value_moving_average)
    }

    fn relative(is_long: bool, exit: &Money, entry: &Money) -> f64 {
        if entry.amount == 0 {
            return 0.0;
        }
        let ratio = exit.amount as f64 / entry.amount as f64;
        if is_long {
            ratio - 1.0
        } else {
            1.0 - ratio
        }
    }

    /// Days between start and end (or the valuation date)
    pub fn holding_period(&self) -> i64 {
        self.holding_period
    }

    pub fn irr(&self) -> f64 {
        self.irr
    }

    pub fn is_loss(&self) -> bool {
        self.profit_loss().is_negative()
    }

    pub fn is_gross_loss(&self) -> bool {
        self.profit_loss_without_taxes_and_fees().is_negative()
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(
                f,
                "{} {} sh {} {} -> {} {}",
                self.security_name,
                crate::pp::common::shares::to_decimal(self.shares),
                self.start.date(),
                self.entry_value,
                end.date(),
                self.exit_value
            ),
            None => write!(
                f,
                "{} {} sh {} {} -> open {}",
                self.security_name,
                crate::pp::common::shares::to_decimal(self.shares),
                self.start.date(),
                self.entry_value,
                self.exit_value
            ),
        }
    }
}
