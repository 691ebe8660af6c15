//! Weighted trades of one classification and their statistics.

use chrono::NaiveDate;
use std::borrow::Cow;

use super::error::TradeError;
use super::trade::Trade;
use super::TradeContext;
use crate::pp::common::{round_half_up, Money};
use crate::pp::Classification;

/// A trade with its share (0.0 - 1.0) in a category
#[derive(Debug, Clone, Copy)]
pub struct TradeAssignment<'a> {
    pub trade: &'a Trade,
    pub weight: f64,
}

/// Results of the last [`TradeCategory::recompute`]
#[derive(Debug, Clone)]
struct Statistics {
    trade_count: i64,
    total_entry_value: Money,
    total_entry_value_moving_average: Money,
    total_exit_value: Money,
    total_profit_loss: Money,
    total_profit_loss_without_taxes_and_fees: Money,
    total_profit_loss_moving_average: Money,
    total_profit_loss_moving_average_without_taxes_and_fees: Money,
    average_return: f64,
    average_return_moving_average: f64,
    average_irr: f64,
    average_holding_period: i64,
    win_rate: f64,
    winning_trades_count: i64,
    losing_trades_count: i64,
}

impl Statistics {
    fn empty(currency: &str) -> Self {
        Self {
            trade_count: 0,
            total_entry_value: Money::zero(currency),
            total_entry_value_moving_average: Money::zero(currency),
            total_exit_value: Money::zero(currency),
            total_profit_loss: Money::zero(currency),
            total_profit_loss_without_taxes_and_fees: Money::zero(currency),
            total_profit_loss_moving_average: Money::zero(currency),
            total_profit_loss_moving_average_without_taxes_and_fees: Money::zero(currency),
            average_return: 0.0,
            average_return_moving_average: 0.0,
            average_irr: 0.0,
            average_holding_period: 0,
            win_rate: 0.0,
            winning_trades_count: 0,
            losing_trades_count: 0,
        }
    }
}

/// Trades (or fractions of trades) attributed to one classification.
///
/// Statistics are computed by [`recompute`](Self::recompute), which
/// [`add_trade`](Self::add_trade) calls after every addition. Accessors only
/// read the stored results.
pub struct TradeCategory<'a> {
    classification: Cow<'a, Classification>,
    context: TradeContext<'a>,
    weighted_trades: Vec<TradeAssignment<'a>>,
    statistics: Statistics,
}

impl<'a> TradeCategory<'a> {
    pub fn new(classification: Cow<'a, Classification>, context: &TradeContext<'a>) -> Self {
        let statistics = Statistics::empty(context.term_currency());
        Self {
            classification,
            context: *context,
            weighted_trades: Vec::new(),
            statistics,
        }
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Add `trade` with `weight` and recompute all statistics
    pub fn add_trade(&mut self, trade: &'a Trade, weight: f64) -> Result<(), TradeError> {
        self.push_trade(trade, weight);
        self.recompute()
    }

    /// Add without recomputing; callers adding many trades recompute once
    pub(crate) fn push_trade(&mut self, trade: &'a Trade, weight: f64) {
        self.weighted_trades.push(TradeAssignment { trade, weight });
    }

    /// Distinct trades of this category in order of addition
    pub fn trades(&self) -> Vec<&'a Trade> {
        let mut trades: Vec<&'a Trade> = Vec::new();
        for wt in &self.weighted_trades {
            if !trades.iter().any(|t| std::ptr::eq(*t, wt.trade)) {
                trades.push(wt.trade);
            }
        }
        trades
    }

    pub fn trade_assignments(&self) -> &[TradeAssignment<'a>] {
        &self.weighted_trades
    }

    pub fn total_weight(&self) -> f64 {
        self.weighted_trades.iter().map(|wt| wt.weight).sum()
    }

    pub fn recompute(&mut self) -> Result<(), TradeError> {
        let term = self.context.term_currency().to_string();
        let total_weight = self.total_weight();

        if total_weight == 0.0 {
            self.statistics = Statistics::empty(&term);
            return Ok(());
        }

        let today = self.context.today;
        let entry_date = |t: &Trade| t.start().date();
        let exit_date = |t: &Trade| t.end_or(today);

        let total_entry_value = self.weighted_sum(|t| t.entry_value().clone(), entry_date)?;
        let total_entry_value_moving_average =
            self.weighted_sum(|t| t.entry_value_moving_average().clone(), entry_date)?;
        let total_exit_value = self.weighted_sum(|t| t.exit_value().clone(), exit_date)?;
        let total_profit_loss = self.weighted_sum(Trade::profit_loss, exit_date)?;
        let total_profit_loss_without_taxes_and_fees =
            self.weighted_sum(Trade::profit_loss_without_taxes_and_fees, exit_date)?;
        let total_profit_loss_moving_average =
            self.weighted_sum(Trade::profit_loss_moving_average, exit_date)?;
        let total_profit_loss_moving_average_without_taxes_and_fees = self.weighted_sum(
            Trade::profit_loss_moving_average_without_taxes_and_fees,
            exit_date,
        )?;

        let average_return = if total_entry_value.amount != 0 {
            total_exit_value.amount as f64 / total_entry_value.amount as f64 - 1.0
        } else {
            0.0
        };

        let average_return_moving_average = if total_entry_value_moving_average.amount != 0 {
            total_profit_loss_moving_average.amount as f64
                / total_entry_value_moving_average.amount as f64
        } else {
            0.0
        };

        let weighted_holding: f64 = self
            .weighted_trades
            .iter()
            .map(|wt| wt.trade.holding_period() as f64 * wt.weight)
            .sum();

        let winning_weight: f64 = self
            .weighted_trades
            .iter()
            .filter(|wt| !wt.trade.is_loss())
            .map(|wt| wt.weight)
            .sum();
        let losing_weight = total_weight - winning_weight;

        self.statistics = Statistics {
            trade_count: round_half_up(total_weight),
            total_entry_value,
            total_entry_value_moving_average,
            total_exit_value,
            total_profit_loss,
            total_profit_loss_without_taxes_and_fees,
            total_profit_loss_moving_average,
            total_profit_loss_moving_average_without_taxes_and_fees,
            average_return,
            average_return_moving_average,
            average_irr: self.combined_irr()?,
            average_holding_period: round_half_up(weighted_holding / total_weight),
            win_rate: winning_weight / total_weight,
            winning_trades_count: round_half_up(winning_weight),
            losing_trades_count: round_half_up(losing_weight),
        };

        Ok(())
    }

    /// Σ value(trade) converted at date(trade), scaled by weight
    fn weighted_sum(
        &self,
        value: impl Fn(&Trade) -> Money,
        date: impl Fn(&Trade) -> NaiveDate,
    ) -> Result<Money, TradeError> {
        let converter = self.context.converter;
        let mut amounts = Vec::with_capacity(self.weighted_trades.len());
        for wt in &self.weighted_trades {
            let converted = converter.convert(date(wt.trade), &value(wt.trade))?;
            amounts.push(converted.multiply_and_round(wt.weight));
        }
        Ok(Money::sum(converter.term_currency(), &amounts))
    }

    /// IRR over the cash flows of all weighted trades combined
    fn combined_irr(&self) -> Result<f64, TradeError> {
        let mut flows: Vec<(NaiveDate, f64)> = Vec::new();
        for wt in &self.weighted_trades {
            let context = self.context;
            flows.extend(wt.trade.cash_flows(wt.weight, context.converter, context.today)?);
        }

        if flows.is_empty() {
            return Ok(0.0);
        }

        // stable: same-day flows keep their order
        flows.sort_by_key(|(date, _)| *date);
        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = flows.into_iter().unzip();

        let irr = self.context.irr.calculate(&dates, &values);
        Ok(if irr.is_finite() { irr } else { 0.0 })
    }

    /// Σ weights, rounded
    pub fn trade_count(&self) -> i64 {
        self.statistics.trade_count
    }

    pub fn total_entry_value(&self) -> &Money {
        &self.statistics.total_entry_value
    }

    pub fn total_entry_value_moving_average(&self) -> &Money {
        &self.statistics.total_entry_value_moving_average
    }

    pub fn total_exit_value(&self) -> &Money {
        &self.statistics.total_exit_value
    }

    pub fn total_profit_loss(&self) -> &Money {
        &self.statistics.total_profit_loss
    }

    pub fn total_profit_loss_without_taxes_and_fees(&self) -> &Money {
        &self.statistics.total_profit_loss_without_taxes_and_fees
    }

    pub fn total_profit_loss_moving_average(&self) -> &Money {
        &self.statistics.total_profit_loss_moving_average
    }

    pub fn total_profit_loss_moving_average_without_taxes_and_fees(&self) -> &Money {
        &self.statistics.total_profit_loss_moving_average_without_taxes_and_fees
    }

    /// Pooled return: Σ exit / Σ entry - 1
    pub fn average_return(&self) -> f64 {
        self.statistics.average_return
    }

    pub fn average_return_moving_average(&self) -> f64 {
        self.statistics.average_return_moving_average
    }

    pub fn average_irr(&self) -> f64 {
        self.statistics.average_irr
    }

    /// Weighted mean holding period in days
    pub fn average_holding_period(&self) -> i64 {
        self.statistics.average_holding_period
    }

    pub fn win_rate(&self) -> f64 {
        self.statistics.win_rate
    }

    pub fn winning_trades_count(&self) -> i64 {
        self.statistics.winning_trades_count
    }

    pub fn losing_trades_count(&self) -> i64 {
        self.statistics.losing_trades_count
    }
}

impl std::fmt::Debug for TradeCategory<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeCategory")
            .field("classification", &self.classification.id)
            .field("weighted_trades", &self.weighted_trades.len())
            .field("statistics", &self.statistics)
            .finish()
    }
}
